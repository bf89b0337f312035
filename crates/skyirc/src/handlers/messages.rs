use crate::message::{MAX_MSG_TARGETS, split_targets};
use crate::replies::IrcReply;
use crate::server::Context;
use crate::users::{Session, SessionState};

use super::request::reply_to;

// 4.4.1 Private messages
//
//       Command: PRIVMSG
//    Parameters: <receiver>{,<receiver>} <text to be sent>
//
//    Receivers are nicknames or channels. Messaging an away user sends the
//    away message back to the sender.
pub async fn handle_privmsg(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    if args.is_empty() {
        reply_to(session, ctx, IrcReply::ErrNoRecipient { command: "PRIVMSG" }).await;
        return;
    }
    if args.len() < 2 || args[1].is_empty() {
        reply_to(session, ctx, IrcReply::ErrNoTextToSend).await;
        return;
    }
    let targets = split_targets(&args[0]);
    if targets.len() > MAX_MSG_TARGETS {
        reply_to(session, ctx, IrcReply::ErrTooManyTargets { target: &args[0] }).await;
        return;
    }
    for target in &targets {
        privmsg_one(target, &args[1], session, ctx).await;
    }
}

async fn privmsg_one(target: &str, text: &str, session: &Session, ctx: &Context) {
    let prefix = session.prefix().await;
    let line = IrcReply::Privmsg { target, text }.prefixed(&prefix);

    if target.starts_with(['#', '&']) {
        let Some(channel) = ctx.channels.lookup(target) else {
            reply_to(session, ctx, IrcReply::ErrNoSuchNick { nick: target }).await;
            return;
        };
        let chan_data = channel.snapshot().await;
        match chan_data.members.get(&session.id) {
            None => {
                // outsiders are gated by +n, and +m silences them anyway
                if chan_data.no_outside_msg || chan_data.moderated {
                    reply_to(session, ctx, IrcReply::ErrCannotSendToChan { channel: target })
                        .await;
                    return;
                }
            }
            Some(member) => {
                if chan_data.moderated && !member.can_speak {
                    reply_to(session, ctx, IrcReply::ErrCannotSendToChan { channel: target })
                        .await;
                    return;
                }
            }
        }
        let ids: Vec<_> = chan_data.members.keys().copied().collect();
        ctx.users.send_to_members(&ids, Some(session.id), &line).await;
    } else {
        let Some(peer) = ctx.users.lookup(target).await else {
            reply_to(session, ctx, IrcReply::ErrNoSuchNick { nick: target }).await;
            return;
        };
        peer.send_line(line).await;
        let peer_data = peer.snapshot().await;
        if peer_data.away {
            reply_to(
                session,
                ctx,
                IrcReply::Away {
                    nick: target,
                    message: &peer_data.away_message,
                },
            )
            .await;
        }
    }
}

// 4.4.2 Notice
//
//       Command: NOTICE
//    Parameters: <nickname> <text>
//
//    Same target grammar as PRIVMSG but never triggers automatic replies:
//    unresolved targets and authorization misses are dropped silently.
//    Delivery honors the receiver's notice flag.
pub async fn handle_notice(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    if args.len() < 2 || args[1].is_empty() {
        return;
    }
    let targets = split_targets(&args[0]);
    if targets.len() > MAX_MSG_TARGETS {
        reply_to(session, ctx, IrcReply::ErrTooManyTargets { target: &args[0] }).await;
        return;
    }
    for target in &targets {
        notice_one(target, &args[1], session, ctx).await;
    }
}

async fn notice_one(target: &str, text: &str, session: &Session, ctx: &Context) {
    let prefix = session.prefix().await;
    let line = IrcReply::Notice { target, text }.prefixed(&prefix);

    if target.starts_with(['#', '&']) {
        let Some(channel) = ctx.channels.lookup(target) else {
            return;
        };
        let chan_data = channel.snapshot().await;
        match chan_data.members.get(&session.id) {
            None => {
                if chan_data.no_outside_msg || chan_data.moderated {
                    return;
                }
            }
            Some(member) => {
                if chan_data.moderated && !member.can_speak {
                    return;
                }
            }
        }
        for (&id, _) in &chan_data.members {
            if id == session.id {
                continue;
            }
            if let Some(peer) = ctx.users.get(id) {
                if peer.snapshot().await.receives_notices {
                    peer.send_line(line.clone()).await;
                }
            }
        }
    } else if let Some(peer) = ctx.users.lookup(target).await {
        if peer.snapshot().await.receives_notices {
            peer.send_line(line).await;
        }
    }
}

// 5.1 Away
//
//       Command: AWAY
//    Parameters: [message]
pub async fn handle_away(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    match args.first() {
        None => {
            session.update(|data| data.away = false).await;
            reply_to(session, ctx, IrcReply::Unaway).await;
        }
        Some(message) => {
            let message = message.clone();
            session
                .update(|data| {
                    data.away = true;
                    data.away_message = message;
                })
                .await;
            reply_to(session, ctx, IrcReply::NowAway).await;
        }
    }
}
