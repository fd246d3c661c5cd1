use std::sync::Arc;

use super::hub::Outbound;
use super::protocol::{ClientMessage, ServerMessage};
use super::server::PartyServer;
use super::signaling::SignalKind;
use crate::error::{PartyError, Result};

/// Per-connection dispatcher. Remembers which room the connection is in and
/// turns each decoded client event into one server operation.
pub struct PartySession {
    connection_id: String,
    room_code: Option<String>,
    server: Arc<PartyServer>,
}

impl PartySession {
    pub async fn open(server: Arc<PartyServer>, sender: Outbound) -> Result<Self> {
        let connection_id = uuid::Uuid::new_v4().to_string();
        server.connect(&connection_id, sender).await?;

        Ok(Self {
            connection_id,
            room_code: None,
            server,
        })
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn room_code(&self) -> Option<&str> {
        self.room_code.as_deref()
    }

    /// Runs one event to completion. Rejections the client should see become an
    /// `error` event; the rest are logged and dropped.
    pub async fn handle_message(&mut self, message: ClientMessage) {
        if let Err(e) = self.dispatch(message).await {
            match e.client_message() {
                Some(text) => {
                    tracing::info!(connection_id = %self.connection_id, error = %e, "Request rejected");
                    if let Err(send_err) = self
                        .server
                        .hub()
                        .send(&self.connection_id, &ServerMessage::error(text))
                        .await
                    {
                        tracing::debug!(error = %send_err, "Could not deliver error event");
                    }
                }
                None => {
                    tracing::debug!(connection_id = %self.connection_id, error = %e, "Request dropped");
                }
            }
        }
    }

    async fn dispatch(&mut self, message: ClientMessage) -> Result<()> {
        let id = self.connection_id.clone();

        match message {
            ClientMessage::CreateRoom { username } => {
                let code = self.server.create_room(&id, username.as_deref()).await?;
                match self.room_code.replace(code) {
                    Some(previous) => self.server.leave_room(&id, &previous).await,
                    None => Ok(()),
                }
            }
            ClientMessage::JoinRoom {
                room_code,
                username,
            } => {
                let code = self
                    .server
                    .switch_room(&id, self.room_code.as_deref(), &room_code, username.as_deref())
                    .await?;
                self.room_code = Some(code);
                Ok(())
            }
            ClientMessage::RequestPeerList => {
                self.server.request_peer_list(&id, self.current_room()?).await
            }
            ClientMessage::WebrtcOffer { target_id, offer } => {
                self.server.relay(SignalKind::Offer, &id, &target_id, offer).await
            }
            ClientMessage::WebrtcAnswer { target_id, answer } => {
                self.server.relay(SignalKind::Answer, &id, &target_id, answer).await
            }
            ClientMessage::IceCandidate {
                target_id,
                candidate,
            } => {
                self.server
                    .relay(SignalKind::IceCandidate, &id, &target_id, candidate)
                    .await
            }
            ClientMessage::ShareSubtitle {
                subtitle_data,
                subtitle_name,
            } => {
                self.server
                    .share_subtitle(&id, self.current_room()?, subtitle_data, subtitle_name)
                    .await
            }
            ClientMessage::SubtitleText { text } => {
                self.server.subtitle_text(&id, self.current_room()?, text).await
            }
            ClientMessage::ClientReady => self.server.client_ready(&id, self.current_room()?).await,
            ClientMessage::Play { current_time } => {
                self.server.play(&id, self.current_room()?, current_time).await
            }
            ClientMessage::Pause { current_time } => {
                self.server.pause(&id, self.current_room()?, current_time).await
            }
            ClientMessage::Seek { current_time } => {
                self.server.seek(&id, self.current_room()?, current_time).await
            }
            ClientMessage::HostTimeUpdate { current_time } => {
                self.server
                    .host_time_update(&id, self.current_room()?, current_time)
                    .await
            }
            ClientMessage::Skip { offset } => {
                self.server.skip(&id, self.current_room()?, offset).await
            }
        }
    }

    fn current_room(&self) -> Result<&str> {
        self.room_code
            .as_deref()
            .ok_or_else(|| PartyError::NotInRoom(self.connection_id.clone()))
    }

    /// Disconnect transition; safe to call more than once.
    pub async fn cleanup(&mut self) {
        let room_code = self.room_code.take();
        if let Err(e) = self
            .server
            .disconnect(&self.connection_id, room_code.as_deref())
            .await
        {
            tracing::error!(connection_id = %self.connection_id, error = %e, "Error during disconnect");
        }
    }
}
