use log::debug;
use tokio::time::Instant;

use crate::message::Message;
use crate::replies::IrcReply;
use crate::server::Context;
use crate::users::Session;

use super::{channels, messages, miscellanneous, registration};

/// Sends one server-origin reply back to the requesting client.
pub async fn reply_to(session: &Session, ctx: &Context, reply: IrcReply<'_>) {
    session
        .send_line(reply.prefixed(&ctx.config.server.svdomain))
        .await;
}

/// The command dispatcher: frames the request line and routes it to its
/// handler. Malformed lines are dropped without touching the connection.
pub async fn dispatch(line: &str, session: &Session, ctx: &Context) {
    let message = match Message::parse(line) {
        Ok(message) => message,
        Err(e) => {
            debug!("[{}] invalid request dropped: {e}", session.id);
            return;
        }
    };

    if matches!(message.command.as_str(), "PRIVMSG" | "NOTICE") {
        session
            .update(|data| data.last_activity = Instant::now())
            .await;
    }

    let args = &message.args;
    match message.command.as_str() {
        "PASS" => registration::handle_pass(args, session, ctx).await,
        "NICK" => registration::handle_nick(args, session, ctx).await,
        "USER" => registration::handle_user(args, session, ctx).await,
        "OPER" => registration::handle_oper(args, session, ctx).await,
        "QUIT" => registration::handle_quit(args, session, ctx).await,

        "JOIN" => channels::handle_join(args, session, ctx).await,
        "PART" => channels::handle_part(args, session, ctx).await,
        "TOPIC" => channels::handle_topic(args, session, ctx).await,
        "NAMES" => channels::handle_names(args, session, ctx).await,
        "LIST" => channels::handle_list(args, session, ctx).await,
        "INVITE" => channels::handle_invite(args, session, ctx).await,
        "KICK" => channels::handle_kick(args, session, ctx).await,
        "MODE" => channels::handle_mode(args, session, ctx).await,

        "PRIVMSG" => messages::handle_privmsg(args, session, ctx).await,
        "NOTICE" => messages::handle_notice(args, session, ctx).await,
        "AWAY" => messages::handle_away(args, session, ctx).await,

        "PING" => miscellanneous::handle_ping(args, session, ctx).await,
        "PONG" => miscellanneous::handle_pong(args, session, ctx).await,
        "KILL" => miscellanneous::handle_kill(args, session, ctx).await,
        "WALLOPS" => miscellanneous::handle_wallops(args, session, ctx).await,
        "ERROR" => miscellanneous::handle_error(args, session, ctx).await,
        "REHASH" => miscellanneous::handle_rehash(session, ctx).await,
        "RESTART" => miscellanneous::handle_restart(session, ctx).await,
        "VERSION" => miscellanneous::handle_version(session, ctx).await,
        "TIME" => miscellanneous::handle_time(session, ctx).await,
        "ADMIN" => miscellanneous::handle_admin(session, ctx).await,
        "INFO" => miscellanneous::handle_info(session, ctx).await,
        "LUSERS" => miscellanneous::handle_lusers(session, ctx).await,
        "USERHOST" => miscellanneous::handle_userhost(args, session, ctx).await,
        "ISON" => miscellanneous::handle_ison(args, session, ctx).await,
        "SUMMON" => miscellanneous::handle_summon(session, ctx).await,
        "USERS" => miscellanneous::handle_users(session, ctx).await,
        "WHO" => miscellanneous::handle_who(args, session, ctx).await,
        "WHOIS" => miscellanneous::handle_whois(args, session, ctx).await,
        "WHOWAS" => miscellanneous::handle_whowas(args, session, ctx).await,

        // server-to-server linking is out of scope, accepted and ignored
        "SERVER" | "SQUIT" | "CONNECT" | "TRACE" | "STATS" | "LINKS" => {}

        command => {
            debug!("[{}] unknown command {command}", session.id);
            reply_to(session, ctx, IrcReply::ErrUnknownCommand { command }).await;
        }
    }
}
