pub mod party_routes;
pub mod party_websocket;

pub use party_routes::routes;
