use clap::Parser;
use log::info;
use server::config::DEFAULT_CONFIG_PATH;
use server::network::Server;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Host port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Path of the JSON configuration, created with defaults if missing
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Maximum number of connected viewers
    #[arg(short, long, default_value = "64")]
    max_viewers: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting directory host...");
    info!("Configuration: {}", args.config);

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, &args.config, args.max_viewers).await?;

    server.run().await?;

    Ok(())
}
