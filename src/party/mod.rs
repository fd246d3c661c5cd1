pub mod hub;
pub mod protocol;
pub mod room;
pub mod server;
pub mod session;
pub mod signaling;

pub use protocol::{ClientMessage, ServerMessage};
pub use server::PartyServer;
pub use session::PartySession;
