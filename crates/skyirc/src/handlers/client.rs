use log::{debug, info, warn};
use std::collections::HashSet;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant};

use crate::message::MAX_LINE_LENGTH;
use crate::replies::{IrcReply, ping_token};
use crate::server::Context;
use crate::users::{ClientId, Outbound, Session};

use super::request::dispatch;

const OUTBOUND_CHANNEL_SIZE: usize = 64;

/// Entry point for a freshly accepted socket: registers the session in the
/// user directory, splits the socket and runs the reader/writer task pair.
pub async fn handle_client(socket: TcpStream, hostname: String, ctx: Context) {
    let (tx_outbound, rx_outbound) = mpsc::channel::<Outbound>(OUTBOUND_CHANNEL_SIZE);
    let session = Session::new(&ctx.config, hostname, tx_outbound);

    if !ctx.users.insert(session.clone()) {
        // lost the race against other accepts, drop without a reply
        info!("[{}] user directory full, connection dropped", session.id);
        return;
    }

    let (read_half, write_half) = io::split(socket);
    tokio::spawn(client_writer_task(
        write_half,
        rx_outbound,
        session.clone(),
        ctx.clone(),
    ));
    client_reader_task(read_half, session, ctx).await;
}

/// Reads request lines and drives the two liveness timers. The cycle timer
/// sends a fresh PING challenge, the deadline timer tears the connection
/// down unless a matching PONG pushed it forward.
async fn client_reader_task(reader: ReadHalf<TcpStream>, session: Session, ctx: Context) {
    let refresh = Duration::from_secs(ctx.config.connection.ping_refresh_delay);
    let timeout = Duration::from_secs(ctx.config.connection.ping_timeout_delay);
    session.arm_dead_line(Instant::now() + timeout).await;
    let mut next_ping = Instant::now() + refresh;

    let mut lines = BufReader::new(reader).lines();
    loop {
        if session.is_closed() {
            break;
        }
        let dead_line = session.dead_line().await;
        tokio::select! {
            read = lines.next_line() => match read {
                Ok(Some(line)) => {
                    if line.len() + 2 <= MAX_LINE_LENGTH {
                        debug!("[{}] >> {line}", session.id);
                        dispatch(&line, &session, &ctx).await;
                    } else {
                        // oversized lines are dropped, the connection stays up
                        debug!("[{}] oversized line dropped", session.id);
                    }
                }
                Ok(None) => {
                    close_because(&session, &ctx, "Connection reset by peer").await;
                    break;
                }
                Err(e) => {
                    warn!("[{}] read failed: {e}", session.id);
                    close_because(&session, &ctx, "Connection reset by peer").await;
                    break;
                }
            },
            _ = time::sleep_until(next_ping) => {
                let token = ping_token();
                session
                    .update(|data| data.last_ping_token = token.clone())
                    .await;
                session.send_line(IrcReply::Ping { token: &token }.bare()).await;
                next_ping += refresh;
            },
            _ = time::sleep_until(dead_line) => {
                // a PONG may have pushed the deadline while we slept
                if Instant::now() >= session.dead_line().await {
                    close_because(&session, &ctx, "Ping timeout").await;
                    break;
                }
            },
            _ = session.wait_closed() => break,
        }
    }
}

/// Drains the outbound queue onto the socket. All writes of one connection
/// go through here, so their order is the order the handlers produced them.
async fn client_writer_task(
    mut writer: WriteHalf<TcpStream>,
    mut rx_outbound: mpsc::Receiver<Outbound>,
    session: Session,
    ctx: Context,
) {
    loop {
        let message = tokio::select! {
            message = rx_outbound.recv() => message,
            _ = session.wait_closed() => break,
        };
        match message {
            Some(Outbound::Line(line)) => {
                if let Err(e) = writer.write_all(line.as_bytes()).await {
                    warn!("[{}] write failed: {e}", session.id);
                    close_because(&session, &ctx, "Connection reset by peer").await;
                    break;
                }
            }
            Some(Outbound::Shutdown) | None => break,
        }
    }
    let _ = writer.shutdown().await;
}

/// Graceful disconnect. Idempotent; in order: QUIT broadcast to every
/// co-channel peer, channel membership cleanup (empty channels are
/// destroyed), user directory removal, then socket/timer teardown.
pub async fn close_because(session: &Session, ctx: &Context, reason: &str) {
    if session.mark_closed() {
        return;
    }
    let data = session.snapshot().await;
    info!(
        "[{}] closing connection of {}: {}",
        session.id, data.nickname, reason
    );

    let quit = IrcReply::Quit { reason }.prefixed(&data.prefix());

    // freeze the audience first: the union of all co-channel members,
    // each peer exactly once, the quitter excluded
    let mut peers: HashSet<ClientId> = HashSet::new();
    for name in &data.joined_channels {
        if let Some(channel) = ctx.channels.lookup(name) {
            peers.extend(channel.member_ids().await);
        }
    }
    peers.remove(&session.id);
    let peers: Vec<ClientId> = peers.into_iter().collect();
    ctx.users.send_to_members(&peers, None, &quit).await;

    for name in &data.joined_channels {
        if let Some(channel) = ctx.channels.lookup(name) {
            if channel.remove_member(session.id).await == 0 {
                ctx.channels.remove(name);
            }
        }
    }

    ctx.users.remove(session.id);
    session.request_shutdown();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::server::ServerContext;
    use crate::users::SessionState;

    async fn registered_session(
        ctx: &Context,
        nickname: &str,
    ) -> (Session, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(16);
        let session = Session::new(&ctx.config, "10.0.0.1".to_string(), tx);
        session
            .update(|data| {
                data.nickname = nickname.to_string();
                data.username = format!("~{nickname}");
                data.state = SessionState::ReadyForMsg;
            })
            .await;
        assert!(ctx.users.insert(session.clone()));
        (session, rx)
    }

    async fn join(ctx: &Context, session: &Session, name: &str, is_op: bool) {
        let channel = match ctx.channels.lookup(name) {
            Some(channel) => channel,
            None => ctx.channels.create(name, &ctx.config).unwrap(),
        };
        channel.add_member(session.id, is_op).await;
        session
            .update(|data| {
                data.joined_channels.insert(name.to_string());
            })
            .await;
    }

    #[tokio::test]
    async fn close_because_cleans_both_directories() {
        let ctx = ServerContext::new(Config::default());
        let (alice, _rx_alice) = registered_session(&ctx, "alice").await;
        let (bob, mut rx_bob) = registered_session(&ctx, "bob").await;
        join(&ctx, &alice, "#room", true).await;
        join(&ctx, &alice, "#side", true).await;
        join(&ctx, &bob, "#room", false).await;

        close_because(&alice, &ctx, "Ping timeout").await;

        // the co-channel peer saw exactly one QUIT line
        let Some(Outbound::Line(line)) = rx_bob.recv().await else {
            panic!("bob should have received the QUIT");
        };
        assert_eq!(line, ":alice!~alice@10.0.0.1 QUIT :Ping timeout\r\n");
        assert!(rx_bob.try_recv().is_err());

        // alice is gone from the user directory and every channel
        assert!(ctx.users.lookup("alice").await.is_none());
        let room = ctx.channels.lookup("#room").unwrap();
        assert!(!room.is_member(alice.id).await);
        // the now-empty channel was destroyed
        assert!(ctx.channels.lookup("#side").is_none());
    }

    #[tokio::test]
    async fn close_because_runs_once() {
        let ctx = ServerContext::new(Config::default());
        let (alice, _rx_alice) = registered_session(&ctx, "alice").await;
        let (bob, mut rx_bob) = registered_session(&ctx, "bob").await;
        join(&ctx, &alice, "#room", true).await;
        join(&ctx, &bob, "#room", false).await;

        close_because(&alice, &ctx, "first").await;
        close_because(&alice, &ctx, "second").await;

        let Some(Outbound::Line(line)) = rx_bob.recv().await else {
            panic!("bob should have received the QUIT");
        };
        assert!(line.contains("QUIT :first"));
        assert!(rx_bob.try_recv().is_err());
    }
}
