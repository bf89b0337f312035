use log::info;
use tokio::fs;

use crate::replies::IrcReply;
use crate::sanity::is_valid_nickname;
use crate::server::Context;
use crate::users::{Session, SessionState};

use super::client::close_because;
use super::request::reply_to;

// 4.1.1 Password message
//
//       Command: PASS
//    Parameters: <password>
//
//    The password must match one of the configured server passwords. A
//    wrong password keeps the connection open and the state unchanged.
pub async fn handle_pass(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::WaitForPass {
        reply_to(session, ctx, IrcReply::ErrAlreadyRegistered).await;
        return;
    }
    if args.len() != 1 {
        reply_to(session, ctx, IrcReply::ErrNeedMoreParams { command: "PASS" }).await;
        return;
    }
    if ctx.config.server.server_password.contains(&args[0]) {
        session
            .update(|data| data.state = SessionState::WaitForUser)
            .await;
    } else {
        reply_to(session, ctx, IrcReply::ErrPasswdMismatch).await;
    }
}

// 4.1.2 Nick message
//
//       Command: NICK
//    Parameters: <nickname>
//
//    Allowed before and after registration; a registered user changing
//    nickname notifies every channel it has joined, with the old prefix.
pub async fn handle_nick(args: &[String], session: &Session, ctx: &Context) {
    let state = session.state().await;
    if state == SessionState::WaitForPass {
        reply_to(session, ctx, IrcReply::ErrPasswdMismatch).await;
        return;
    }
    let Some(nickname) = args.first() else {
        reply_to(session, ctx, IrcReply::ErrNoNicknameGiven).await;
        return;
    };
    if !is_valid_nickname(nickname) {
        reply_to(session, ctx, IrcReply::ErrErroneusNickname { nick: nickname }).await;
        return;
    }
    if session.nickname().await != *nickname && ctx.users.nickname_in_use(nickname).await {
        reply_to(session, ctx, IrcReply::ErrNicknameInUse { nick: nickname }).await;
        return;
    }

    if state == SessionState::ReadyForMsg {
        // notify co-channel users before the prefix changes
        let data = session.snapshot().await;
        let echo = IrcReply::Nick { nick: nickname }.prefixed(&data.prefix());
        let mut peers = std::collections::HashSet::new();
        for name in &data.joined_channels {
            if let Some(channel) = ctx.channels.lookup(name) {
                peers.extend(channel.member_ids().await);
            }
        }
        let peers: Vec<_> = peers.into_iter().collect();
        ctx.users.send_to_members(&peers, None, &echo).await;
    }

    let nickname = nickname.clone();
    session.update(|data| data.nickname = nickname).await;
}

// 4.1.3 User message
//
//       Command: USER
//    Parameters: <username> <hostname> <servername> <realname>
//
//    Completes the registration and triggers the welcome sequence. There is
//    no ident lookup, the username is taken from the client and flagged
//    with a `~`.
pub async fn handle_user(args: &[String], session: &Session, ctx: &Context) {
    match session.state().await {
        SessionState::WaitForPass => {
            reply_to(session, ctx, IrcReply::ErrPasswdMismatch).await;
            return;
        }
        SessionState::ReadyForMsg => {
            reply_to(session, ctx, IrcReply::ErrAlreadyRegistered).await;
            return;
        }
        SessionState::WaitForUser => {}
    }
    if args.len() != 4 {
        reply_to(session, ctx, IrcReply::ErrNeedMoreParams { command: "USER" }).await;
        return;
    }

    // fake ident exchange
    for text in [
        "*** Looking up your hostname...",
        "** Checking ident...",
        "*** Found your hostname",
        "*** No ident response; username prefixed with ~",
    ] {
        reply_to(session, ctx, IrcReply::Notice { target: "AUTH", text }).await;
    }

    let username = format!("~{}", args[0]);
    let realname = args[3].clone();
    session
        .update(|data| {
            data.username = username;
            data.realname = realname;
            data.state = SessionState::ReadyForMsg;
        })
        .await;

    let nickname = session.nickname().await;
    info!("[{}] {} registered", session.id, nickname);
    send_welcome(session, ctx).await;
}

/// 001/002/003 block, then the LUSER block and the MOTD when configured.
async fn send_welcome(session: &Session, ctx: &Context) {
    let data = session.snapshot().await;
    let servername = &ctx.config.server.svdomain;
    let prefix = data.prefix();

    reply_to(
        session,
        ctx,
        IrcReply::Welcome {
            nick: &data.nickname,
            servername,
            prefix: &prefix,
        },
    )
    .await;
    reply_to(
        session,
        ctx,
        IrcReply::YourHost {
            nick: &data.nickname,
            servername,
        },
    )
    .await;
    reply_to(
        session,
        ctx,
        IrcReply::Created {
            nick: &data.nickname,
            date: &ctx.created_at,
        },
    )
    .await;

    if ctx.config.server.send_stats {
        send_luser_block(session, ctx).await;
    }
    if ctx.config.server.send_motd {
        send_motd(session, ctx).await;
    } else {
        reply_to(session, ctx, IrcReply::ErrNoMotd).await;
    }
}

/// LUSER block, also re-emitted by the LUSERS command.
pub async fn send_luser_block(session: &Session, ctx: &Context) {
    reply_to(
        session,
        ctx,
        IrcReply::LuserClient {
            users: ctx.users.count_total(),
            invisible: ctx.users.count_invisible().await,
            servers: 1,
        },
    )
    .await;
    reply_to(
        session,
        ctx,
        IrcReply::LuserOp {
            ops: ctx.users.count_ircops().await,
        },
    )
    .await;
    reply_to(
        session,
        ctx,
        IrcReply::LuserChannels {
            channels: ctx.channels.count(),
        },
    )
    .await;
    reply_to(
        session,
        ctx,
        IrcReply::LuserMe {
            clients: ctx.users.count_total(),
            servers: 1,
        },
    )
    .await;
}

async fn send_motd(session: &Session, ctx: &Context) {
    let filename = &ctx.config.server.motd_filename;
    match fs::read_to_string(filename).await {
        Ok(motd) => {
            reply_to(
                session,
                ctx,
                IrcReply::MotdStart {
                    servername: &ctx.config.server.svdomain,
                },
            )
            .await;
            for line in motd.lines() {
                reply_to(session, ctx, IrcReply::Motd { line }).await;
            }
            reply_to(session, ctx, IrcReply::EndOfMotd).await;
        }
        Err(_) => {
            reply_to(
                session,
                ctx,
                IrcReply::ErrFileError {
                    operation: "open",
                    file: filename,
                },
            )
            .await;
            reply_to(session, ctx, IrcReply::ErrNoMotd).await;
        }
    }
}

// 4.1.5 Oper message
//
//       Command: OPER
//    Parameters: <user> <password>
pub async fn handle_oper(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    if args.len() != 2 {
        reply_to(session, ctx, IrcReply::ErrNeedMoreParams { command: "OPER" }).await;
        return;
    }
    match ctx.config.server.server_ircop.get(&args[0]) {
        Some(password) if *password == args[1] => {
            session.update(|data| data.is_ircop = true).await;
            info!("[{}] {} is now an IRC operator", session.id, args[0]);
            reply_to(session, ctx, IrcReply::YoureOper).await;
        }
        _ => reply_to(session, ctx, IrcReply::ErrPasswdMismatch).await,
    }
}

// 4.1.6 Quit message
//
//       Command: QUIT
//    Parameters: [ <quit message> ]
//
//    The default quit message is the nickname.
pub async fn handle_quit(args: &[String], session: &Session, ctx: &Context) {
    let reason = match args.first() {
        Some(message) if !message.is_empty() => message.clone(),
        _ => session.nickname().await,
    };
    close_because(session, ctx, &reason).await;
}
