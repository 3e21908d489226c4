use clap::Parser;
use log::{error, info};
use server::network::{Server, ServerConfig, ServerMessage};
use server::session::MatchConfig;
use shared::DEFAULT_MAX_SCORE;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value = "60")]
    tick_rate: u32,

    /// Maximum concurrent connections across all rooms
    #[arg(short, long, default_value = "32")]
    max_clients: usize,

    /// Goals needed to win a match
    #[arg(long, default_value_t = DEFAULT_MAX_SCORE)]
    max_score: u32,

    /// Hold each match until a second player has joined
    #[arg(long)]
    wait_for_opponent: bool,

    /// Ask clients to draw collision circles
    #[arg(long)]
    debug_hitboxes: bool,

    /// Seconds of silence before a connection is dropped
    #[arg(long, default_value = "5")]
    timeout_secs: u64,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            tick_duration: Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1))),
            max_clients: self.max_clients,
            client_timeout: Duration::from_secs(self.timeout_secs),
            match_config: MatchConfig {
                wait_for_opponent: self.wait_for_opponent,
                max_score: self.max_score.max(1),
                debug_hitboxes: self.debug_hitboxes,
                ..MatchConfig::default()
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);
    let config = args.server_config();

    info!(
        "Starting server at {} Hz, first to {}{}",
        args.tick_rate,
        config.match_config.max_score,
        if args.wait_for_opponent { ", waiting for opponents" } else { "" }
    );

    let mut server = Server::new(&address, config).await?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received");
                let _ = shutdown.send(ServerMessage::Shutdown);
            }
            Err(e) => error!("Unable to listen for ctrl-c: {}", e),
        }
    });

    server.run().await?;

    Ok(())
}
