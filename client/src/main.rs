use clap::Parser;
use client::network::Client;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:5050")]
    server: String,

    /// Player id to reconnect as; omit to start a new farm
    #[arg(short = 'i', long)]
    id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Connecting to: {}", args.server);
    let mut client = Client::connect(&args.server).await?;

    let id = client.login(args.id).await?;
    println!("Connected as {}", id);

    client.run().await?;

    Ok(())
}
