use chrono::Local;
use log::{info, warn};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::Config;
use crate::channels::ChannelDirectory;
use crate::errors::ServerError;
use crate::handlers::client::handle_client;
use crate::replies::IrcReply;
use crate::users::UserDirectory;

/// Everything a command handler may reach: the configuration, the two
/// process-wide directories and the shutdown hook. Passed explicitly, there
/// is no global server instance.
#[derive(Debug)]
pub struct ServerContext {
    pub config: Config,
    pub users: UserDirectory,
    pub channels: ChannelDirectory,
    /// Startup timestamp, frozen for the 003 reply.
    pub created_at: String,
    shutdown_tx: watch::Sender<bool>,
}

pub type Context = Arc<ServerContext>;

impl ServerContext {
    pub fn new(config: Config) -> Context {
        let (shutdown_tx, _) = watch::channel(false);
        let users = UserDirectory::new(config.limits.nb_users_limit);
        let channels = ChannelDirectory::new(config.limits.nb_channels_limit);
        Arc::new(ServerContext {
            users,
            channels,
            created_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            shutdown_tx,
            config,
        })
    }

    /// Asks the accept loop to stop. Wired to RESTART and to the signal
    /// handler in the binary.
    pub fn request_shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }
}

/// The TCP listener. Accepts connections, enforces the server-wide user cap
/// and hands each accepted socket to its connection tasks.
pub struct Server {
    listener: TcpListener,
    ctx: Context,
}

impl Server {
    pub async fn bind(address: &str, port: u16, config: Config) -> Result<Server, ServerError> {
        let addr = format!("{address}:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        let ctx = ServerContext::new(config);
        info!(
            "{} listening on {:?}",
            ctx.config.server.svdomain,
            listener.local_addr()
        );
        Ok(Server { listener, ctx })
    }

    /// The bound address, useful when binding port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    pub fn context(&self) -> Context {
        self.ctx.clone()
    }

    /// Accept loop. Returns after a shutdown request, once the farewell
    /// notice went out to every registered user.
    pub async fn run(self) {
        let mut shutdown = self.ctx.shutdown_signal();
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, addr)) => self.accept_connection(socket, addr),
                    Err(e) => warn!("accept failed: {e}"),
                },
                _ = shutdown.changed() => break,
            }
        }

        info!("{} shutting down", self.ctx.config.server.svdomain);
        let farewell = IrcReply::Notice {
            target: &self.ctx.config.server.svdomain,
            text: "WARNING: SERVER IS SHUTTING DOWN NOW !",
        }
        .prefixed(&self.ctx.config.server.svdomain);
        self.ctx.users.broadcast_to_all(&farewell).await;
    }

    fn accept_connection(&self, socket: tokio::net::TcpStream, addr: SocketAddr) {
        if self.ctx.users.is_full() {
            // at the user cap the socket is dropped without any reply
            info!("connection from {addr} dropped, user limit reached");
            return;
        }
        info!("client connected: {addr}");
        let hostname = addr.ip().to_string();
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            handle_client(socket, hostname, ctx).await;
        });
    }
}
