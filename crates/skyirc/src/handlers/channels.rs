use std::sync::Arc;

use crate::channels::IrcChannel;
use crate::message::split_targets;
use crate::replies::IrcReply;
use crate::sanity::is_valid_channel_name;
use crate::server::Context;
use crate::users::{Session, SessionState};

use super::request::reply_to;

// 4.2.1 Join message
//
//       Command: JOIN
//    Parameters: <channel>{,<channel>} [<key>{,<key>}]
//
//    Channels are created implicitly on the first JOIN; the creator gets
//    channel op. IRC operators keep op on every channel they join.
pub async fn handle_join(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    if args.is_empty() || args.len() > 2 {
        reply_to(session, ctx, IrcReply::ErrNeedMoreParams { command: "JOIN" }).await;
        return;
    }
    let channels = split_targets(&args[0]);
    let keys = args.get(1).map(|list| split_targets(list)).unwrap_or_default();
    for (index, name) in channels.iter().enumerate() {
        let key = keys.get(index).map(String::as_str).unwrap_or("");
        join_one(name, key, session, ctx).await;
    }
}

async fn join_one(name: &str, key: &str, session: &Session, ctx: &Context) {
    let data = session.snapshot().await;
    if data.joined_channels.contains(name) {
        return;
    }
    if data.joined_channels.len() >= ctx.config.limits.nb_join_limit {
        reply_to(session, ctx, IrcReply::ErrTooManyChannels { channel: name }).await;
        return;
    }

    let prefix = data.prefix();
    let (channel, is_new) = match ctx.channels.lookup(name) {
        Some(channel) => {
            if channel.is_banned(&prefix).await {
                reply_to(session, ctx, IrcReply::ErrBannedFromChan { channel: name }).await;
                return;
            }
            let chan_data = channel.snapshot().await;
            if !chan_data.key.is_empty() && chan_data.key != key {
                reply_to(session, ctx, IrcReply::ErrBadChannelKey { channel: name }).await;
                return;
            }
            if chan_data.invite_only && !channel.is_invited(session.id).await {
                reply_to(session, ctx, IrcReply::ErrInviteOnlyChan { channel: name }).await;
                return;
            }
            if chan_data.members.len() >= chan_data.user_limit {
                reply_to(session, ctx, IrcReply::ErrChannelIsFull { channel: name }).await;
                return;
            }
            (channel, false)
        }
        None => {
            if !is_valid_channel_name(name) {
                reply_to(session, ctx, IrcReply::ErrNoSuchChannel { channel: name }).await;
                return;
            }
            match ctx.channels.create(name, &ctx.config) {
                Some(channel) => (channel, true),
                None => {
                    reply_to(session, ctx, IrcReply::ErrTooManyChannels { channel: name }).await;
                    return;
                }
            }
        }
    };

    let is_op = is_new || data.is_ircop;
    channel.add_member(session.id, is_op).await;
    session
        .update(|data| {
            data.joined_channels.insert(name.to_string());
        })
        .await;

    // JOIN echo goes to the whole channel, the joiner included
    let echo = IrcReply::Join { channel: name, key }.prefixed(&prefix);
    let ids = channel.member_ids().await;
    ctx.users.send_to_members(&ids, None, &echo).await;

    // then topic and names back to the joiner
    let chan_data = channel.snapshot().await;
    if chan_data.topic.is_empty() {
        reply_to(session, ctx, IrcReply::NoTopic { channel: name }).await;
    } else {
        reply_to(
            session,
            ctx,
            IrcReply::Topic {
                channel: name,
                topic: &chan_data.topic,
            },
        )
        .await;
    }
    send_names(session, ctx, &channel).await;
}

/// RPL_NAMREPLY lines for one channel, closed by RPL_ENDOFNAMES.
async fn send_names(session: &Session, ctx: &Context, channel: &Arc<IrcChannel>) {
    let data = channel.snapshot().await;
    for (id, member) in &data.members {
        if let Some(peer) = ctx.users.get(*id) {
            let prefix = peer.prefix().await;
            reply_to(
                session,
                ctx,
                IrcReply::NamReply {
                    channel: &channel.name,
                    is_op: member.is_op,
                    can_speak: member.can_speak,
                    prefix: &prefix,
                },
            )
            .await;
        }
    }
    reply_to(
        session,
        ctx,
        IrcReply::EndOfNames {
            channel: &channel.name,
        },
    )
    .await;
}

// 4.2.2 Part message
//
//       Command: PART
//    Parameters: <channel>{,<channel>}
pub async fn handle_part(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    if args.len() != 1 {
        reply_to(session, ctx, IrcReply::ErrNeedMoreParams { command: "PART" }).await;
        return;
    }
    for name in split_targets(&args[0]) {
        part_one(&name, session, ctx).await;
    }
}

async fn part_one(name: &str, session: &Session, ctx: &Context) {
    let Some(channel) = ctx.channels.lookup(name) else {
        reply_to(session, ctx, IrcReply::ErrNoSuchChannel { channel: name }).await;
        return;
    };
    if !channel.is_member(session.id).await {
        reply_to(session, ctx, IrcReply::ErrNotOnChannel { channel: name }).await;
        return;
    }

    // the parting user is still on the audience for its own PART
    let echo = IrcReply::Part { channel: name }.prefixed(&session.prefix().await);
    let ids = channel.member_ids().await;
    ctx.users.send_to_members(&ids, None, &echo).await;

    if channel.remove_member(session.id).await == 0 {
        ctx.channels.remove(name);
    }
    session
        .update(|data| {
            data.joined_channels.remove(name);
        })
        .await;
}

// 4.2.4 Topic message
//
//       Command: TOPIC
//    Parameters: <channel> [<topic>]
//
//    One argument reads the topic, two set it. Setting requires membership
//    and, on +t channels, channel op.
pub async fn handle_topic(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    if args.is_empty() || args.len() > 2 {
        reply_to(session, ctx, IrcReply::ErrNeedMoreParams { command: "TOPIC" }).await;
        return;
    }
    let name = &args[0];
    let Some(channel) = ctx.channels.lookup(name) else {
        reply_to(session, ctx, IrcReply::ErrNoSuchChannel { channel: name }).await;
        return;
    };

    if args.len() == 1 {
        let data = channel.snapshot().await;
        if data.topic.is_empty() {
            reply_to(session, ctx, IrcReply::NoTopic { channel: name }).await;
        } else {
            reply_to(
                session,
                ctx,
                IrcReply::Topic {
                    channel: name,
                    topic: &data.topic,
                },
            )
            .await;
        }
        return;
    }

    let Some(member) = channel.member(session.id).await else {
        reply_to(session, ctx, IrcReply::ErrNotOnChannel { channel: name }).await;
        return;
    };
    if channel.snapshot().await.topic_ops_only && !member.is_op {
        reply_to(session, ctx, IrcReply::ErrChanOpPrivsNeeded { channel: name }).await;
        return;
    }

    let topic = args[1].clone();
    channel
        .update(|data| data.topic = topic.clone())
        .await;

    let echo = IrcReply::TopicCmd {
        channel: name,
        topic: &args[1],
    }
    .prefixed(&session.prefix().await);
    let ids = channel.member_ids().await;
    ctx.users.send_to_members(&ids, None, &echo).await;
}

// 4.2.5 Names message
//
//       Command: NAMES
//    Parameters: [<channel>{,<channel>}]
//
//    Without arguments lists every visible channel. Secret and private
//    channels stay hidden from non-members; bad names produce no error.
pub async fn handle_names(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    let channels = match args.first() {
        Some(list) => split_targets(list)
            .iter()
            .filter_map(|name| ctx.channels.lookup(name))
            .collect(),
        None => ctx.channels.snapshot(),
    };
    for channel in channels {
        let data = channel.snapshot().await;
        let is_member = data.members.contains_key(&session.id);
        if (data.secret || data.private) && !is_member {
            continue;
        }
        send_names(session, ctx, &channel).await;
    }
}

// 4.2.6 List message
//
//       Command: LIST
//    Parameters: [<channel>{,<channel>}]
pub async fn handle_list(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    reply_to(session, ctx, IrcReply::ListStart).await;
    let channels = match args.first() {
        Some(list) => split_targets(list)
            .iter()
            .filter_map(|name| ctx.channels.lookup(name))
            .collect(),
        None => ctx.channels.snapshot(),
    };
    for channel in channels {
        let data = channel.snapshot().await;
        let is_member = data.members.contains_key(&session.id);
        if data.secret && !is_member {
            continue;
        }
        if data.private && !is_member {
            // the name may leak, the activity may not
            reply_to(
                session,
                ctx,
                IrcReply::List {
                    channel: &channel.name,
                    visible: 0,
                    topic: "Prv",
                },
            )
            .await;
        } else {
            reply_to(
                session,
                ctx,
                IrcReply::List {
                    channel: &channel.name,
                    visible: data.members.len(),
                    topic: &data.topic,
                },
            )
            .await;
        }
    }
    reply_to(session, ctx, IrcReply::ListEnd).await;
}

// 4.2.7 Invite message
//
//       Command: INVITE
//    Parameters: <nickname> <channel>
pub async fn handle_invite(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    if args.len() != 2 {
        reply_to(session, ctx, IrcReply::ErrNeedMoreParams { command: "INVITE" }).await;
        return;
    }
    let (nickname, name) = (&args[0], &args[1]);
    let Some(channel) = ctx.channels.lookup(name) else {
        reply_to(session, ctx, IrcReply::ErrNoSuchChannel { channel: name }).await;
        return;
    };
    let Some(member) = channel.member(session.id).await else {
        reply_to(session, ctx, IrcReply::ErrNotOnChannel { channel: name }).await;
        return;
    };
    if channel.snapshot().await.invite_only && !member.is_op {
        reply_to(session, ctx, IrcReply::ErrChanOpPrivsNeeded { channel: name }).await;
        return;
    }
    let Some(target) = ctx.users.lookup(nickname).await else {
        reply_to(session, ctx, IrcReply::ErrNoSuchNick { nick: nickname }).await;
        return;
    };
    if channel.is_member(target.id).await {
        reply_to(
            session,
            ctx,
            IrcReply::ErrUserOnChannel {
                nick: nickname,
                channel: name,
            },
        )
        .await;
        return;
    }

    channel.invite(target.id).await;
    let invitation = IrcReply::Invite {
        nick: nickname,
        channel: name,
    }
    .prefixed(&session.prefix().await);
    target.send_line(invitation).await;
    reply_to(
        session,
        ctx,
        IrcReply::Inviting {
            channel: name,
            nick: nickname,
        },
    )
    .await;
}

// 4.2.8 Kick command
//
//       Command: KICK
//    Parameters: <channel> <user> [<comment>]
pub async fn handle_kick(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    if args.len() != 2 && args.len() != 3 {
        reply_to(session, ctx, IrcReply::ErrNeedMoreParams { command: "KICK" }).await;
        return;
    }
    let (name, nickname) = (&args[0], &args[1]);
    let comment = args.get(2).map(String::as_str).unwrap_or("");

    let Some(channel) = ctx.channels.lookup(name) else {
        reply_to(session, ctx, IrcReply::ErrNoSuchChannel { channel: name }).await;
        return;
    };
    let Some(member) = channel.member(session.id).await else {
        reply_to(session, ctx, IrcReply::ErrNotOnChannel { channel: name }).await;
        return;
    };
    if !member.is_op {
        reply_to(session, ctx, IrcReply::ErrChanOpPrivsNeeded { channel: name }).await;
        return;
    }
    let Some(target) = ctx.users.lookup(nickname).await else {
        reply_to(session, ctx, IrcReply::ErrNoSuchNick { nick: nickname }).await;
        return;
    };
    if !channel.is_member(target.id).await {
        reply_to(
            session,
            ctx,
            IrcReply::ErrUserNotInChannel {
                nick: nickname,
                channel: name,
            },
        )
        .await;
        return;
    }

    // broadcast first so the kicked user sees its own KICK
    let echo = IrcReply::Kick {
        channel: name,
        nick: nickname,
        comment,
    }
    .prefixed(&session.prefix().await);
    let ids = channel.member_ids().await;
    ctx.users.send_to_members(&ids, None, &echo).await;

    if channel.remove_member(target.id).await == 0 {
        ctx.channels.remove(name);
    }
    target
        .update(|data| {
            data.joined_channels.remove(name);
        })
        .await;
}

// 4.2.3 Channel mode message, read-only form
//
//       Command: MODE
//    Parameters: <channel>
//
//    Flag manipulation is out of scope; a bare MODE reads the flags and
//    anything else is ignored.
pub async fn handle_mode(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    let Some(name) = args.first() else {
        reply_to(session, ctx, IrcReply::ErrNeedMoreParams { command: "MODE" }).await;
        return;
    };
    if !name.starts_with(['#', '&']) {
        return;
    }
    let Some(channel) = ctx.channels.lookup(name) else {
        reply_to(session, ctx, IrcReply::ErrNoSuchChannel { channel: name }).await;
        return;
    };
    if args.len() == 1 {
        let mode = channel.snapshot().await.mode_string();
        reply_to(
            session,
            ctx,
            IrcReply::ChannelModeIs {
                channel: name,
                mode: &mode,
            },
        )
        .await;
    }
}
