use dashmap::DashMap;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::sanity::mask_matches;
use crate::users::ClientId;

/// Per-channel standing of one member.
#[derive(Debug, Clone, Copy)]
pub struct MemberInfo {
    pub can_speak: bool,
    pub is_op: bool,
}

/// Mutable channel state, guarded by the channel lock.
#[derive(Debug, Clone)]
pub struct ChannelData {
    /// Empty string means unset.
    pub topic: String,
    /// Empty string means unset.
    pub key: String,
    pub private: bool,
    pub secret: bool,
    pub invite_only: bool,
    pub topic_ops_only: bool,
    pub no_outside_msg: bool,
    pub moderated: bool,
    pub user_limit: usize,
    pub bans: HashSet<String>,
    pub invites: HashSet<ClientId>,
    pub members: HashMap<ClientId, MemberInfo>,
}

impl ChannelData {
    /// Current flags rendered for RPL_CHANNELMODEIS, key and limit params
    /// appended.
    pub fn mode_string(&self) -> String {
        let mut modes = String::from("+");
        for (flag, set) in [
            ('p', self.private),
            ('s', self.secret),
            ('i', self.invite_only),
            ('t', self.topic_ops_only),
            ('n', self.no_outside_msg),
            ('m', self.moderated),
            ('k', !self.key.is_empty()),
            ('l', true),
        ] {
            if set {
                modes.push(flag);
            }
        }
        format!("{} {}", modes, self.user_limit)
    }
}

/// One chatroom. Created on first JOIN, destroyed when its last member
/// leaves.
#[derive(Debug)]
pub struct IrcChannel {
    pub name: String,
    data: RwLock<ChannelData>,
}

impl IrcChannel {
    pub fn new(name: String, config: &Config) -> Self {
        debug!("creating channel {name}");
        IrcChannel {
            name,
            data: RwLock::new(ChannelData {
                topic: String::new(),
                key: String::new(),
                private: config.channel.is_private,
                secret: config.channel.is_secret,
                invite_only: config.channel.is_invite_only,
                topic_ops_only: config.channel.topic_setby_op_only,
                no_outside_msg: config.channel.no_outside_msg,
                moderated: config.channel.is_moderated,
                user_limit: config.limits.users_limit_per_channel,
                bans: HashSet::new(),
                invites: HashSet::new(),
                members: HashMap::new(),
            }),
        }
    }

    pub async fn snapshot(&self) -> ChannelData {
        self.data.read().await.clone()
    }

    /// Applies a mutation to the channel state.
    pub async fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut ChannelData),
    {
        let mut data = self.data.write().await;
        mutate(&mut data);
    }

    /// Adds a member. Speaking rights follow the moderation flag, channel
    /// ops always speak. A pending invitation is consumed by the join.
    pub async fn add_member(&self, id: ClientId, is_op: bool) {
        let mut data = self.data.write().await;
        let can_speak = !data.moderated || is_op;
        data.invites.remove(&id);
        data.members.insert(id, MemberInfo { can_speak, is_op });
    }

    /// Removes a member and reports how many remain; the caller drops the
    /// channel from the directory at zero.
    pub async fn remove_member(&self, id: ClientId) -> usize {
        let mut data = self.data.write().await;
        data.members.remove(&id);
        data.members.len()
    }

    pub async fn is_member(&self, id: ClientId) -> bool {
        self.data.read().await.members.contains_key(&id)
    }

    pub async fn member(&self, id: ClientId) -> Option<MemberInfo> {
        self.data.read().await.members.get(&id).copied()
    }

    /// Frozen membership list for a fan-out.
    pub async fn member_ids(&self) -> Vec<ClientId> {
        self.data.read().await.members.keys().copied().collect()
    }

    pub async fn member_count(&self) -> usize {
        self.data.read().await.members.len()
    }

    /// Matches a user prefix against the ban mask set.
    pub async fn is_banned(&self, prefix: &str) -> bool {
        let data = self.data.read().await;
        data.bans.iter().any(|mask| mask_matches(mask, prefix))
    }

    pub async fn invite(&self, id: ClientId) {
        self.data.write().await.invites.insert(id);
    }

    pub async fn is_invited(&self, id: ClientId) -> bool {
        self.data.read().await.invites.contains(&id)
    }
}

/// Registry of active channels keyed by name, bounded by the configured
/// channel cap.
#[derive(Debug)]
pub struct ChannelDirectory {
    channels: DashMap<String, Arc<IrcChannel>>,
    limit: usize,
}

impl ChannelDirectory {
    pub fn new(limit: usize) -> Self {
        ChannelDirectory {
            channels: DashMap::new(),
            limit,
        }
    }

    pub fn count(&self) -> usize {
        self.channels.len()
    }

    pub fn is_full(&self) -> bool {
        self.channels.len() >= self.limit
    }

    pub fn lookup(&self, name: &str) -> Option<Arc<IrcChannel>> {
        self.channels.get(name).map(|entry| entry.value().clone())
    }

    /// Creates a channel. `None` when the directory is at its cap.
    pub fn create(&self, name: &str, config: &Config) -> Option<Arc<IrcChannel>> {
        if self.is_full() {
            return None;
        }
        info!("channel {name} created");
        let channel = Arc::new(IrcChannel::new(name.to_string(), config));
        self.channels.insert(name.to_string(), channel.clone());
        Some(channel)
    }

    pub fn remove(&self, name: &str) {
        info!("channel {name} destroyed");
        self.channels.remove(name);
    }

    /// Clones every channel handle out of the map, so iteration never holds
    /// a directory shard lock across an await.
    pub fn snapshot(&self) -> Vec<Arc<IrcChannel>> {
        self.channels
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_enforces_channel_cap() {
        let config = Config::default();
        let directory = ChannelDirectory::new(2);
        assert!(directory.create("#a", &config).is_some());
        assert!(directory.create("#b", &config).is_some());
        assert!(directory.create("#c", &config).is_none());
        assert_eq!(directory.count(), 2);

        directory.remove("#a");
        assert!(directory.create("#c", &config).is_some());
    }

    #[tokio::test]
    async fn creator_keeps_op_and_moderation_mutes_others() {
        let mut config = Config::default();
        config.channel.is_moderated = true;
        let channel = IrcChannel::new("#quiet".to_string(), &config);

        channel.add_member(1, true).await;
        channel.add_member(2, false).await;

        let creator = channel.member(1).await.unwrap();
        assert!(creator.is_op);
        assert!(creator.can_speak);

        let guest = channel.member(2).await.unwrap();
        assert!(!guest.is_op);
        assert!(!guest.can_speak);
    }

    #[tokio::test]
    async fn join_consumes_invitation() {
        let config = Config::default();
        let channel = IrcChannel::new("#priv".to_string(), &config);
        channel.invite(7).await;
        assert!(channel.is_invited(7).await);
        channel.add_member(7, false).await;
        assert!(!channel.is_invited(7).await);
    }

    #[tokio::test]
    async fn ban_masks_are_globs() {
        let config = Config::default();
        let channel = IrcChannel::new("#room".to_string(), &config);
        channel
            .update(|data| {
                data.bans.insert("*!*@10.0.0.*".to_string());
            })
            .await;
        assert!(channel.is_banned("bob!~bob@10.0.0.7").await);
        assert!(!channel.is_banned("bob!~bob@192.168.0.7").await);
    }

    #[tokio::test]
    async fn remove_member_reports_remaining() {
        let config = Config::default();
        let channel = IrcChannel::new("#room".to_string(), &config);
        channel.add_member(1, true).await;
        channel.add_member(2, false).await;
        assert_eq!(channel.remove_member(1).await, 1);
        assert_eq!(channel.remove_member(2).await, 0);
    }

    #[tokio::test]
    async fn mode_string_reflects_flags() {
        let config = Config::default();
        let channel = IrcChannel::new("#room".to_string(), &config);
        channel
            .update(|data| data.key = "sekret".to_string())
            .await;
        // defaults set +t and +n, the key adds +k, the limit is always shown
        assert_eq!(channel.snapshot().await.mode_string(), "+tnkl 10");
    }
}
