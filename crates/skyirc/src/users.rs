use dashmap::DashMap;
use log::debug;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{RwLock, mpsc, watch};
use tokio::time::Instant;

use crate::config::Config;
use crate::replies::user_prefix;

pub type ClientId = u64;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(0);

/// Registration progress of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    WaitForPass,
    WaitForUser,
    ReadyForMsg,
}

/// Message handed to a connection's writer task.
#[derive(Debug)]
pub enum Outbound {
    Line(String),
    Shutdown,
}

/// Per-connection user state. Kept behind the session lock; handlers read a
/// clone and write through the `Session` helpers.
#[derive(Debug, Clone)]
pub struct UserData {
    pub nickname: String,
    pub username: String,
    pub realname: String,
    pub hostname: String,
    pub servername: String,
    pub state: SessionState,
    pub is_ircop: bool,
    pub receives_wallops: bool,
    pub receives_notices: bool,
    pub invisible: bool,
    pub away: bool,
    pub away_message: String,
    pub last_activity: Instant,
    pub last_ping_token: String,
    pub joined_channels: HashSet<String>,
}

impl UserData {
    pub fn prefix(&self) -> String {
        user_prefix(&self.nickname, &self.username, &self.hostname)
    }
}

/// Cheap cloneable handle on one client connection: shared user state, the
/// outbound queue feeding the writer task, and the liveness bookkeeping used
/// by the ping timers.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: ClientId,
    data: Arc<RwLock<UserData>>,
    tx_outbound: mpsc::Sender<Outbound>,
    closed: Arc<AtomicBool>,
    close_signal: Arc<watch::Sender<bool>>,
    dead_line: Arc<RwLock<Instant>>,
}

impl Session {
    pub fn new(config: &Config, hostname: String, tx_outbound: mpsc::Sender<Outbound>) -> Self {
        let id = NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed);
        // placeholder nickname, unique per process, tracks the session until
        // the client picks its own
        let nickname = format!("Anon_{id:x}");
        debug!("[{id}] new session {nickname} from {hostname}");

        let state = if config.server.is_password_protected {
            SessionState::WaitForPass
        } else {
            SessionState::WaitForUser
        };

        let data = UserData {
            nickname,
            username: String::new(),
            realname: String::new(),
            hostname,
            servername: config.server.svdomain.clone(),
            state,
            is_ircop: config.user.is_ircop,
            receives_wallops: config.user.is_receiving_wallops,
            receives_notices: config.user.is_receiving_notices,
            invisible: config.user.is_invisible,
            away: config.user.is_away,
            away_message: config.user.away_message.clone(),
            last_activity: Instant::now(),
            last_ping_token: String::new(),
            joined_channels: HashSet::new(),
        };

        let (close_signal, _) = watch::channel(false);
        Session {
            id,
            data: Arc::new(RwLock::new(data)),
            tx_outbound,
            closed: Arc::new(AtomicBool::new(false)),
            close_signal: Arc::new(close_signal),
            dead_line: Arc::new(RwLock::new(Instant::now())),
        }
    }

    pub async fn snapshot(&self) -> UserData {
        self.data.read().await.clone()
    }

    pub async fn nickname(&self) -> String {
        self.data.read().await.nickname.clone()
    }

    pub async fn prefix(&self) -> String {
        self.data.read().await.prefix()
    }

    pub async fn state(&self) -> SessionState {
        self.data.read().await.state
    }

    pub async fn is_registered(&self) -> bool {
        self.data.read().await.state == SessionState::ReadyForMsg
    }

    /// Applies a mutation to the shared user state.
    pub async fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut UserData),
    {
        let mut data = self.data.write().await;
        mutate(&mut data);
    }

    /// Queues one wire line for the writer task. Errors mean the writer is
    /// gone already; departing peers are not an error.
    pub async fn send_line(&self, line: String) {
        let _ = self.tx_outbound.send(Outbound::Line(line)).await;
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Flags the session as closed. Returns true when it already was, which
    /// makes the disconnect path idempotent.
    pub fn mark_closed(&self) -> bool {
        self.closed.swap(true, Ordering::SeqCst)
    }

    /// Stops both connection tasks. The queued shutdown marker lets the
    /// writer drain what it can; `try_send` keeps this path non-blocking
    /// even against a saturated queue.
    pub fn request_shutdown(&self) {
        let _ = self.tx_outbound.try_send(Outbound::Shutdown);
        let _ = self.close_signal.send(true);
    }

    /// Resolves once the session is flagged closed, however late the caller
    /// subscribes.
    pub async fn wait_closed(&self) {
        let mut signal = self.close_signal.subscribe();
        if *signal.borrow() {
            return;
        }
        let _ = signal.changed().await;
    }

    /// Pushes the dead-ping deadline forward.
    pub async fn arm_dead_line(&self, deadline: Instant) {
        *self.dead_line.write().await = deadline;
    }

    pub async fn dead_line(&self) -> Instant {
        *self.dead_line.read().await
    }
}

/// Registry of every live connection, keyed by client id and bounded by the
/// configured user cap. Nickname resolution is case sensitive.
#[derive(Debug)]
pub struct UserDirectory {
    sessions: DashMap<ClientId, Session>,
    limit: usize,
}

impl UserDirectory {
    pub fn new(limit: usize) -> Self {
        UserDirectory {
            sessions: DashMap::new(),
            limit,
        }
    }

    pub fn is_full(&self) -> bool {
        self.sessions.len() >= self.limit
    }

    pub fn insert(&self, session: Session) -> bool {
        if self.is_full() {
            return false;
        }
        self.sessions.insert(session.id, session);
        true
    }

    pub fn remove(&self, id: ClientId) {
        self.sessions.remove(&id);
    }

    pub fn get(&self, id: ClientId) -> Option<Session> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    pub fn count_total(&self) -> usize {
        self.sessions.len()
    }

    /// Clones every session handle out of the map. All iteration happens on
    /// the snapshot so no directory shard lock is held across an await.
    pub fn snapshot(&self) -> Vec<Session> {
        self.sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Resolves a registered connection by nickname. Sessions still in a
    /// pre-registration state are not reachable here.
    pub async fn lookup(&self, nickname: &str) -> Option<Session> {
        for session in self.snapshot() {
            let data = session.snapshot().await;
            if data.state == SessionState::ReadyForMsg && data.nickname == nickname {
                return Some(session);
            }
        }
        None
    }

    /// Whether any connection, registered or not, holds the nickname.
    pub async fn nickname_in_use(&self, nickname: &str) -> bool {
        for session in self.snapshot() {
            if session.nickname().await == nickname {
                return true;
            }
        }
        false
    }

    pub async fn count_invisible(&self) -> usize {
        let mut count = 0;
        for session in self.snapshot() {
            if session.snapshot().await.invisible {
                count += 1;
            }
        }
        count
    }

    pub async fn count_ircops(&self) -> usize {
        let mut count = 0;
        for session in self.snapshot() {
            if session.snapshot().await.is_ircop {
                count += 1;
            }
        }
        count
    }

    /// Delivers a line to every registered connection that receives notices.
    pub async fn broadcast_to_all(&self, line: &str) {
        for session in self.snapshot() {
            let data = session.snapshot().await;
            if data.state == SessionState::ReadyForMsg && data.receives_notices {
                session.send_line(line.to_string()).await;
            }
        }
    }

    /// Delivers a line to every registered IRC op that receives wallops.
    pub async fn broadcast_to_ircops(&self, line: &str) {
        for session in self.snapshot() {
            let data = session.snapshot().await;
            if data.state == SessionState::ReadyForMsg && data.is_ircop && data.receives_wallops {
                session.send_line(line.to_string()).await;
            }
        }
    }

    /// Fans one line out to an already-frozen recipient list.
    pub async fn send_to_members(&self, ids: &[ClientId], exclude: Option<ClientId>, line: &str) {
        for &id in ids {
            if Some(id) == exclude {
                continue;
            }
            if let Some(session) = self.get(id) {
                session.send_line(line.to_string()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session(config: &Config) -> (Session, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(8);
        (Session::new(config, "10.0.0.1".to_string(), tx), rx)
    }

    #[tokio::test]
    async fn placeholder_nicknames_are_unique() {
        let config = Config::default();
        let (a, _rxa) = test_session(&config);
        let (b, _rxb) = test_session(&config);
        assert_ne!(a.nickname().await, b.nickname().await);
        assert!(a.nickname().await.starts_with("Anon_"));
    }

    #[tokio::test]
    async fn initial_state_follows_password_protection() {
        let mut config = Config::default();
        let (open, _rx) = test_session(&config);
        assert_eq!(open.state().await, SessionState::WaitForUser);

        config.server.is_password_protected = true;
        let (locked, _rx) = test_session(&config);
        assert_eq!(locked.state().await, SessionState::WaitForPass);
    }

    #[tokio::test]
    async fn lookup_skips_pre_registration_sessions() {
        let config = Config::default();
        let directory = UserDirectory::new(10);
        let (session, _rx) = test_session(&config);
        session
            .update(|data| data.nickname = "alice".to_string())
            .await;
        assert!(directory.insert(session.clone()));

        assert!(directory.lookup("alice").await.is_none());
        assert!(directory.nickname_in_use("alice").await);

        session
            .update(|data| data.state = SessionState::ReadyForMsg)
            .await;
        assert!(directory.lookup("alice").await.is_some());
    }

    #[tokio::test]
    async fn directory_enforces_user_cap() {
        let config = Config::default();
        let directory = UserDirectory::new(1);
        let (first, _rxa) = test_session(&config);
        let (second, _rxb) = test_session(&config);
        assert!(directory.insert(first));
        assert!(directory.is_full());
        assert!(!directory.insert(second));
        assert_eq!(directory.count_total(), 1);
    }

    #[tokio::test]
    async fn mark_closed_is_idempotent() {
        let config = Config::default();
        let (session, _rx) = test_session(&config);
        assert!(!session.mark_closed());
        assert!(session.mark_closed());
        assert!(session.is_closed());
    }

    #[tokio::test]
    async fn broadcast_skips_unregistered_and_muted() {
        let config = Config::default();
        let directory = UserDirectory::new(10);

        let (registered, mut rx_registered) = test_session(&config);
        registered
            .update(|data| data.state = SessionState::ReadyForMsg)
            .await;
        let (muted, mut rx_muted) = test_session(&config);
        muted
            .update(|data| {
                data.state = SessionState::ReadyForMsg;
                data.receives_notices = false;
            })
            .await;
        let (pending, mut rx_pending) = test_session(&config);

        directory.insert(registered);
        directory.insert(muted);
        directory.insert(pending);

        directory.broadcast_to_all("NOTICE x :hi\r\n").await;

        assert!(matches!(rx_registered.try_recv(), Ok(Outbound::Line(_))));
        assert!(rx_muted.try_recv().is_err());
        assert!(rx_pending.try_recv().is_err());
    }
}
