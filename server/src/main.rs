use clap::Parser;
use log::{error, info};
use server::farm::GameRules;
use server::network::{Server, ServerConfig};
use std::time::Duration;

/// Main-method of the application.
/// Parses command-line arguments, then runs the farm server until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
        port: u16,
        /// Growth ticker period in milliseconds
        #[clap(short, long, default_value = "100")]
        tick_ms: u64,
        /// Seconds a crop needs to ripen
        #[clap(short, long, default_value_t = shared::GROW_DURATION_MS / 1000)]
        grow_secs: u64,
    }

    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        addr: format!("{}:{}", args.host, args.port),
        tick_period: Duration::from_millis(args.tick_ms.max(1)),
        rules: GameRules {
            grow_duration: Duration::from_secs(args.grow_secs),
            ..GameRules::default()
        },
    };

    let server = Server::bind(config).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server stopped: {}", e);
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
