use std::time::Duration;

use clap::Parser;
use tactix::TactixServer;
use tracing_subscriber::EnvFilter;

/// Realtime multiplayer tic-tac-toe server
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "TACTIX_BIND", default_value = "127.0.0.1:8080")]
    bind: String,

    /// How long a disconnected player may stay away before forfeiting
    #[arg(long, env = "TACTIX_DISCONNECT_TIMEOUT_MS", default_value_t = 10_000)]
    disconnect_timeout_ms: u64,

    /// How long a rematch offer waits for the opponent
    #[arg(long, env = "TACTIX_REMATCH_TTL_SECS", default_value_t = 30)]
    rematch_ttl_secs: u64,

    /// Seed for ids and bot moves, for reproducible runs
    #[arg(long)]
    seed: Option<u64>,

    /// Log filter, e.g. `info` or `tactix=debug`; `RUST_LOG` wins when set
    #[arg(long, env = "TACTIX_LOG", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let mut builder = TactixServer::builder()
        .bind(&args.bind)
        .disconnect_timeout(Duration::from_millis(args.disconnect_timeout_ms))
        .rematch_ttl(Duration::from_secs(args.rematch_ttl_secs));
    if let Some(seed) = args.seed {
        builder = builder.rng_seed(seed);
    }
    let server = builder.build().await?;

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("received interrupt, shutting down");
                shutdown.cancel();
            }
            Err(e) => tracing::error!(error = %e, "failed to listen for interrupt"),
        }
    });

    server.run().await?;
    Ok(())
}
