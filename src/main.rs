use std::sync::Arc;

use peerstream::api;
use peerstream::config::Config;
use peerstream::party::PartyServer;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.log.json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let party_server = Arc::new(PartyServer::new());
    let routes = api::routes(party_server, &config.party);

    let (ip, port) = config.bind_address();
    tracing::info!(
        address = ?ip,
        port = port,
        public_dir = %config.party.public_dir.display(),
        "PeerStream listening"
    );

    warp::serve(routes)
        .run(config.bind_address())
        .await;
}
