use std::path::PathBuf;
use std::sync::Arc;

use warp::http::header::{self, HeaderMap, HeaderValue};
use warp::Filter;

use super::party_websocket;
use crate::config::PartyConfig;
use crate::party::PartyServer;

/// Everything served under `/peerstream`: the WebSocket, a health check and
/// the static browser client, with hardening headers on every reply.
pub fn routes(
    party_server: Arc<PartyServer>,
    config: &PartyConfig,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    party_websocket_route(party_server, config.max_message_bytes)
        .or(party_health_check())
        .or(static_client(config.public_dir.clone()))
        .with(warp::reply::with::headers(security_headers()))
}

pub fn party_websocket_route(
    party_server: Arc<PartyServer>,
    max_message_bytes: usize,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("peerstream" / "ws")
        .and(warp::ws())
        .and(with_party_server(party_server))
        .map(move |ws: warp::ws::Ws, party_server: Arc<PartyServer>| {
            ws.max_message_size(max_message_bytes)
                .on_upgrade(move |websocket| {
                    party_websocket::handle_party_websocket(websocket, party_server)
                })
        })
}

pub fn party_health_check() -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path!("peerstream" / "health")
        .and(warp::get())
        .map(|| {
            warp::reply::json(&serde_json::json!({
                "status": "healthy",
                "service": "PeerStream",
                "version": env!("CARGO_PKG_VERSION")
            }))
        })
}

pub fn static_client(
    public_dir: PathBuf,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::path("peerstream").and(warp::fs::dir(public_dir))
}

fn security_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers
}

fn with_party_server(
    party_server: Arc<PartyServer>,
) -> impl Filter<Extract = (Arc<PartyServer>,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || party_server.clone())
}
