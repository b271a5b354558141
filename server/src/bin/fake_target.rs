//! Stand-in game server answering A2S info and player queries, for trying the
//! directory host without a real game server.

use clap::Parser;
use log::info;
use rand::Rng;
use server::a2s::Responder;
use server::query::{InfoResponse, PlayerEntry, PlayerResponse};
use std::time::Duration;
use tokio::net::UdpSocket;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to answer queries on
    #[arg(short, long, default_value = "127.0.0.1:27015")]
    bind: String,

    /// Server name reported in info responses
    #[arg(short, long, default_value = "Fake Server")]
    name: String,

    /// Current map
    #[arg(short, long, default_value = "de_dust2")]
    map: String,

    /// Number of players online
    #[arg(short, long, default_value = "4")]
    players: u8,

    #[arg(long, default_value = "10")]
    max_players: u8,

    #[arg(long, default_value = "0")]
    bots: u8,
}

fn random_roster(count: u8) -> PlayerResponse {
    let mut rng = rand::thread_rng();
    PlayerResponse {
        players: (1..=count)
            .map(|i| PlayerEntry {
                name: format!("Player {i}"),
                score: rng.gen_range(0..50),
                duration: Duration::from_secs(rng.gen_range(30..3600)),
            })
            .collect(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let info = InfoResponse {
        name: args.name,
        map: args.map,
        players: args.players,
        max_players: args.max_players,
        bots: args.bots,
    };
    let roster = random_roster(args.players);

    let socket = UdpSocket::bind(&args.bind).await?;
    info!(
        "Answering queries on {} as {:?} ({}/{})",
        socket.local_addr()?,
        info.name,
        info.players,
        info.max_players
    );

    Responder::new(info, roster).serve(socket).await?;

    Ok(())
}
