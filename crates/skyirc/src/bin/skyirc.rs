use clap::Parser;
use flexi_logger::Logger;
use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;

use skyirc::config::Config;
use skyirc::server::Server;

/// SkyIRC, a small RFC 1459 IRC server.
#[derive(Parser, Debug)]
#[command(name = "skyirc", version)]
struct Cli {
    /// Address to bind
    address: String,
    /// Port to listen on
    port: u16,
    /// TOML configuration file; built-in defaults apply without one
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    Logger::try_with_env_or_str("info")
        .and_then(|logger| logger.log_to_stderr().start())
        .ok();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                error!("{e}");
                return ExitCode::from(1);
            }
        },
        None => Config::default(),
    };

    let server = match Server::bind(&cli.address, cli.port, config).await {
        Ok(server) => server,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(1);
        }
    };

    // SIGINT takes the same shutdown path as RESTART
    let ctx = server.context();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctx.request_shutdown();
        }
    });

    server.run().await;
    info!("server stopped");
    ExitCode::SUCCESS
}
