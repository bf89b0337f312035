use chrono::Local;
use log::{error, info};
use tokio::time::{Duration, Instant};

use crate::replies::IrcReply;
use crate::server::Context;
use crate::users::{Session, SessionState};

use super::client::close_because;
use super::registration::send_luser_block;
use super::request::reply_to;

// 4.6.2 Ping message
//
//       Command: PING
//    Parameters: <token>
pub async fn handle_ping(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    let Some(token) = args.first() else {
        reply_to(session, ctx, IrcReply::ErrNoOrigin).await;
        return;
    };
    reply_to(
        session,
        ctx,
        IrcReply::Pong {
            server: &ctx.config.server.svdomain,
            token,
        },
    )
    .await;
}

// 4.6.3 Pong message
//
//       Command: PONG
//    Parameters: <daemon> <token>
//
//    Accepted in every state since the server pings connections from the
//    moment they are accepted. Only the exact challenge token rearms the
//    dead-ping deadline.
pub async fn handle_pong(args: &[String], session: &Session, ctx: &Context) {
    let Some(token) = args.last() else {
        reply_to(session, ctx, IrcReply::ErrNoOrigin).await;
        return;
    };
    if *token == session.snapshot().await.last_ping_token {
        let timeout = Duration::from_secs(ctx.config.connection.ping_timeout_delay);
        session.arm_dead_line(Instant::now() + timeout).await;
    }
}

// 4.6.1 Kill message
//
//       Command: KILL
//    Parameters: <nickname> <comment>
pub async fn handle_kill(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    if args.len() != 2 {
        reply_to(session, ctx, IrcReply::ErrNeedMoreParams { command: "KILL" }).await;
        return;
    }
    if !session.snapshot().await.is_ircop {
        reply_to(session, ctx, IrcReply::ErrNoPrivileges).await;
        return;
    }
    let Some(target) = ctx.users.lookup(&args[0]).await else {
        reply_to(session, ctx, IrcReply::ErrNoSuchNick { nick: &args[0] }).await;
        return;
    };

    close_because(&target, ctx, &args[1]).await;

    let nickname = session.nickname().await;
    reply_to(
        session,
        ctx,
        IrcReply::Notice {
            target: &nickname,
            text: "User connection killed !",
        },
    )
    .await;
}

// 5.6 Operwall message
//
//       Command: WALLOPS
//    Parameters: <text>
pub async fn handle_wallops(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    if args.len() != 1 {
        reply_to(session, ctx, IrcReply::ErrNeedMoreParams { command: "WALLOPS" }).await;
        return;
    }
    if !session.snapshot().await.is_ircop {
        reply_to(session, ctx, IrcReply::ErrNoPrivileges).await;
        return;
    }
    let line = IrcReply::Wallops { text: &args[0] }.prefixed(&session.prefix().await);
    ctx.users.broadcast_to_ircops(&line).await;
}

// 4.6.4 Error message: op-only relay of a client error report to the other
// operators, mirrored to the server log.
pub async fn handle_error(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    if args.len() != 1 {
        reply_to(session, ctx, IrcReply::ErrNeedMoreParams { command: "ERROR" }).await;
        return;
    }
    let data = session.snapshot().await;
    if !data.is_ircop {
        reply_to(session, ctx, IrcReply::ErrNoPrivileges).await;
        return;
    }
    error!("[{}] ERROR from {}: {}", session.id, data.nickname, args[0]);
    let text = format!("ERROR: {}", args[0]);
    let line = IrcReply::Notice {
        target: &ctx.config.server.svdomain,
        text: &text,
    }
    .prefixed(&data.prefix());
    ctx.users.broadcast_to_ircops(&line).await;
}

/// REHASH acknowledges and does nothing: the configuration came from the
/// bootstrap, there is no file to reload at runtime.
pub async fn handle_rehash(session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    if !session.snapshot().await.is_ircop {
        reply_to(session, ctx, IrcReply::ErrNoPrivileges).await;
        return;
    }
    reply_to(session, ctx, IrcReply::Rehashing { file: "dummy.conf" }).await;
}

/// RESTART asks the server context to shut the accept loop down.
pub async fn handle_restart(session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    if !session.snapshot().await.is_ircop {
        reply_to(session, ctx, IrcReply::ErrNoPrivileges).await;
        return;
    }
    info!(
        "[{}] RESTART requested by {}",
        session.id,
        session.nickname().await
    );
    ctx.request_shutdown();
}

pub async fn handle_version(session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    reply_to(
        session,
        ctx,
        IrcReply::Version {
            servername: &ctx.config.server.svdomain,
            comments: "SkyIRC",
        },
    )
    .await;
}

pub async fn handle_time(session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    let now = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    reply_to(
        session,
        ctx,
        IrcReply::Time {
            servername: &ctx.config.server.svdomain,
            time: &now,
        },
    )
    .await;
}

pub async fn handle_admin(session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    let admin = &ctx.config.admin;
    reply_to(
        session,
        ctx,
        IrcReply::AdminMe {
            servername: &ctx.config.server.svdomain,
        },
    )
    .await;
    reply_to(
        session,
        ctx,
        IrcReply::AdminLoc1 {
            location: &admin.admin_location_1,
        },
    )
    .await;
    reply_to(
        session,
        ctx,
        IrcReply::AdminLoc2 {
            location: &admin.admin_location_2,
        },
    )
    .await;
    reply_to(
        session,
        ctx,
        IrcReply::AdminEmail {
            mail: &admin.admin_mail,
        },
    )
    .await;
}

pub async fn handle_info(session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    for line in &ctx.config.admin.server_infos {
        reply_to(session, ctx, IrcReply::Info { line }).await;
    }
    reply_to(session, ctx, IrcReply::EndOfInfo).await;
}

pub async fn handle_lusers(session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    send_luser_block(session, ctx).await;
}

// 4.8 Userhost message: up to five `nick=+user@host` entries.
pub async fn handle_userhost(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    if args.is_empty() {
        reply_to(session, ctx, IrcReply::ErrNeedMoreParams { command: "USERHOST" }).await;
        return;
    }
    let mut entries = Vec::new();
    for nickname in args.iter().take(5) {
        if let Some(peer) = ctx.users.lookup(nickname).await {
            let data = peer.snapshot().await;
            entries.push(format!(
                "{}=+{}@{}",
                data.nickname, data.username, data.hostname
            ));
        }
    }
    let replies = entries.join(" ");
    reply_to(session, ctx, IrcReply::Userhost { replies: &replies }).await;
}

// 4.9 Ison message: echoes the subset of nicknames currently online.
pub async fn handle_ison(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    if args.is_empty() {
        reply_to(session, ctx, IrcReply::ErrNeedMoreParams { command: "ISON" }).await;
        return;
    }
    let mut online = Vec::new();
    for nickname in args {
        if ctx.users.lookup(nickname).await.is_some() {
            online.push(nickname.clone());
        }
    }
    let nicks = online.join(" ");
    reply_to(session, ctx, IrcReply::Ison { nicks: &nicks }).await;
}

pub async fn handle_summon(session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    reply_to(session, ctx, IrcReply::ErrSummonDisabled).await;
}

pub async fn handle_users(session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    reply_to(session, ctx, IrcReply::ErrUsersDisabled).await;
}

// WHO / WHOIS / WHOWAS are reserved for future work and answer with their
// end-of-list terminator only.
pub async fn handle_who(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    let name = args.first().map(String::as_str).unwrap_or("*");
    reply_to(session, ctx, IrcReply::EndOfWho { name }).await;
}

pub async fn handle_whois(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    let nick = args.first().map(String::as_str).unwrap_or("*");
    reply_to(session, ctx, IrcReply::EndOfWhois { nick }).await;
}

pub async fn handle_whowas(args: &[String], session: &Session, ctx: &Context) {
    if session.state().await != SessionState::ReadyForMsg {
        return;
    }
    let nick = args.first().map(String::as_str).unwrap_or("*");
    reply_to(session, ctx, IrcReply::EndOfWhowas { nick }).await;
}
