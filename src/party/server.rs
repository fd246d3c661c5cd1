use std::sync::Arc;

use serde_json::Value;
use tokio::sync::OwnedMutexGuard;

use super::hub::{ConnectionHub, Outbound};
use super::protocol::ServerMessage;
use super::room::{normalize_room_code, now_millis, Departure, Room, RoomRegistry};
use super::signaling::{self, SignalKind};
use crate::error::{PartyError, Result};

const HOST_LEFT_MESSAGE: &str = "Host has left the party";

/// Who may issue a room-scoped request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Host,
    Guest,
    Member,
}

/// Watch-party coordinator: room membership, host-driven playback sync and
/// the signaling relay, on top of an owned registry and connection hub.
pub struct PartyServer {
    registry: Arc<RoomRegistry>,
    hub: Arc<ConnectionHub>,
}

impl PartyServer {
    pub fn new() -> Self {
        Self {
            registry: RoomRegistry::new(),
            hub: ConnectionHub::new(),
        }
    }

    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    pub fn hub(&self) -> &Arc<ConnectionHub> {
        &self.hub
    }

    /// Registers a new connection and tells it its id.
    pub async fn connect(&self, connection_id: &str, sender: Outbound) -> Result<()> {
        self.hub.register(connection_id, sender).await;
        self.hub
            .send(
                connection_id,
                &ServerMessage::Connected {
                    connection_id: connection_id.to_string(),
                },
            )
            .await
    }

    pub async fn create_room(&self, connection_id: &str, username: Option<&str>) -> Result<String> {
        let (room_code, handle) = self.registry.create_room(connection_id, username).await?;
        let room = handle.lock().await;

        self.hub
            .send(
                connection_id,
                &ServerMessage::RoomCreated {
                    room_code: room_code.clone(),
                    users: room.users.clone(),
                },
            )
            .await?;

        Ok(room_code)
    }

    /// Adds a guest and hands it the room snapshot. Returns the canonical code.
    pub async fn join_room(
        &self,
        connection_id: &str,
        room_code: &str,
        username: Option<&str>,
    ) -> Result<String> {
        let room = self
            .registry
            .join_room(room_code, connection_id, username)
            .await?;

        self.hub
            .send(
                connection_id,
                &ServerMessage::RoomJoined {
                    room_code: room.code.clone(),
                    subtitle_data: room.subtitle_data.clone(),
                    subtitle_name: room.subtitle_name.clone(),
                    users: room.users.clone(),
                    is_playing: room.is_playing,
                    current_time: room.current_time,
                },
            )
            .await?;

        self.broadcast_membership(&room).await?;

        if let Some(user) = room.user(connection_id) {
            let notice = ServerMessage::PeerJoined {
                peer_id: connection_id.to_string(),
                username: user.username.clone(),
            };
            if let Err(e) = self.hub.send(&room.host_id, &notice).await {
                tracing::debug!(room_code = %room.code, error = %e, "Host unreachable for peer_joined");
            }
        }

        Ok(room.code.clone())
    }

    /// Join for a connection that may already be in `previous`. The target is
    /// validated and looked up first so a rejected join leaves the old room
    /// untouched; rejoining the current room never leaves it.
    pub async fn switch_room(
        &self,
        connection_id: &str,
        previous: Option<&str>,
        room_code: &str,
        username: Option<&str>,
    ) -> Result<String> {
        let code = normalize_room_code(room_code)?;
        if self.registry.get_room(&code).await.is_none() {
            return Err(PartyError::RoomNotFound(code));
        }

        if let Some(previous) = previous.filter(|p| *p != code) {
            self.leave_room(connection_id, previous).await?;
        }

        self.join_room(connection_id, &code, username).await
    }

    /// Replays `peer_joined` for every other member so a host that set up its
    /// media late can start connections to guests that are already there.
    pub async fn request_peer_list(&self, connection_id: &str, room_code: &str) -> Result<()> {
        let room = self.lock_room(room_code, connection_id, Role::Host).await?;

        for user in room.users.iter().filter(|u| u.id != connection_id) {
            self.hub
                .send(
                    connection_id,
                    &ServerMessage::PeerJoined {
                        peer_id: user.id.clone(),
                        username: user.username.clone(),
                    },
                )
                .await?;
        }
        Ok(())
    }

    pub async fn relay(
        &self,
        kind: SignalKind,
        connection_id: &str,
        target_id: &str,
        payload: Value,
    ) -> Result<()> {
        signaling::relay(&self.hub, kind, connection_id, target_id, payload).await
    }

    pub async fn share_subtitle(
        &self,
        connection_id: &str,
        room_code: &str,
        subtitle_data: Value,
        subtitle_name: Option<String>,
    ) -> Result<()> {
        let mut room = self.lock_room(room_code, connection_id, Role::Host).await?;

        room.subtitle_data = Some(subtitle_data.clone());
        room.subtitle_name = subtitle_name.clone();
        tracing::info!(room_code = %room.code, subtitle_name = ?subtitle_name, "Subtitle shared");

        self.broadcast(
            &room,
            Some(connection_id),
            &ServerMessage::SubtitleReceived {
                subtitle_data,
                subtitle_name,
            },
        )
        .await
    }

    /// Transient "current subtitle line"; not stored on the room.
    pub async fn subtitle_text(&self, connection_id: &str, room_code: &str, text: String) -> Result<()> {
        let room = self.lock_room(room_code, connection_id, Role::Host).await?;
        self.broadcast(&room, Some(connection_id), &ServerMessage::SubtitleText { text })
            .await
    }

    pub async fn client_ready(&self, connection_id: &str, room_code: &str) -> Result<()> {
        let mut room = self.lock_room(room_code, connection_id, Role::Member).await?;
        room.mark_ready(connection_id);
        tracing::debug!(
            room_code = %room.code,
            connection_id = %connection_id,
            all_ready = room.all_ready(),
            "Member ready"
        );
        self.broadcast_membership(&room).await
    }

    pub async fn play(&self, connection_id: &str, room_code: &str, current_time: f64) -> Result<()> {
        let mut room = self.lock_room(room_code, connection_id, Role::Host).await?;
        room.sync_to(current_time, Some(true));

        let message = ServerMessage::SyncPlay {
            current_time,
            server_timestamp: now_millis(),
        };
        self.broadcast(&room, None, &message).await
    }

    pub async fn pause(&self, connection_id: &str, room_code: &str, current_time: f64) -> Result<()> {
        let mut room = self.lock_room(room_code, connection_id, Role::Host).await?;
        room.sync_to(current_time, Some(false));

        let message = ServerMessage::SyncPause {
            current_time,
            server_timestamp: now_millis(),
        };
        self.broadcast(&room, None, &message).await
    }

    pub async fn seek(&self, connection_id: &str, room_code: &str, current_time: f64) -> Result<()> {
        let mut room = self.lock_room(room_code, connection_id, Role::Host).await?;
        room.sync_to(current_time, None);

        let message = ServerMessage::SyncSeek {
            current_time,
            server_timestamp: now_millis(),
        };
        self.broadcast(&room, Some(connection_id), &message).await
    }

    /// Periodic drift correction from the host. Ignored while paused.
    pub async fn host_time_update(
        &self,
        connection_id: &str,
        room_code: &str,
        current_time: f64,
    ) -> Result<()> {
        let mut room = self.lock_room(room_code, connection_id, Role::Host).await?;
        if !room.is_playing {
            return Ok(());
        }
        room.sync_to(current_time, None);

        let message = ServerMessage::TimeCheck {
            current_time,
            server_timestamp: now_millis(),
        };
        self.broadcast(&room, Some(connection_id), &message).await
    }

    /// Guest asks the host to jump by `offset` seconds. Passed through as sent;
    /// the host decides.
    pub async fn skip(&self, connection_id: &str, room_code: &str, offset: Value) -> Result<()> {
        let room = self.lock_room(room_code, connection_id, Role::Guest).await?;
        self.hub
            .send(
                &room.host_id,
                &ServerMessage::SkipRequest {
                    offset,
                    from: connection_id.to_string(),
                },
            )
            .await
    }

    /// Takes a connection out of its room as one transition: a guest leaving
    /// updates the rest of the room, the host leaving closes it.
    pub async fn leave_room(&self, connection_id: &str, room_code: &str) -> Result<()> {
        let Some(handle) = self.registry.get_room(room_code).await else {
            return Ok(());
        };
        let mut room = handle.lock().await;

        match self.registry.remove_user(&mut room, connection_id).await {
            Departure::Closed { remaining } => {
                self.hub
                    .send_many(
                        &remaining,
                        None,
                        &ServerMessage::RoomClosed {
                            message: HOST_LEFT_MESSAGE.to_string(),
                        },
                    )
                    .await
            }
            Departure::Left => {
                self.broadcast(&room, None, &ServerMessage::UserListUpdate { users: room.users.clone() })
                    .await?;
                self.broadcast(
                    &room,
                    None,
                    &ServerMessage::PeerDisconnected {
                        peer_id: connection_id.to_string(),
                    },
                )
                .await?;
                self.broadcast(
                    &room,
                    None,
                    &ServerMessage::ReadyStatus {
                        all_ready: room.all_ready(),
                    },
                )
                .await
            }
            Departure::NotMember => Ok(()),
        }
    }

    /// Terminal event for a connection. Only the first call for an id has any effect.
    pub async fn disconnect(&self, connection_id: &str, room_code: Option<&str>) -> Result<()> {
        if !self.hub.unregister(connection_id).await {
            tracing::debug!(connection_id = %connection_id, "Duplicate disconnect ignored");
            return Ok(());
        }
        tracing::info!(connection_id = %connection_id, room_code = ?room_code, "Connection closed");

        match room_code {
            Some(code) => self.leave_room(connection_id, code).await,
            None => Ok(()),
        }
    }

    /// Locks a live room after checking the caller's standing in it.
    async fn lock_room(
        &self,
        room_code: &str,
        connection_id: &str,
        role: Role,
    ) -> Result<OwnedMutexGuard<Room>> {
        let handle = self
            .registry
            .get_room(room_code)
            .await
            .ok_or_else(|| PartyError::NotInRoom(connection_id.to_string()))?;
        let room = handle.lock_owned().await;

        if room.closed || !room.contains(connection_id) {
            return Err(PartyError::NotInRoom(connection_id.to_string()));
        }

        let allowed = match role {
            Role::Host => room.is_host(connection_id),
            Role::Guest => !room.is_host(connection_id),
            Role::Member => true,
        };
        if !allowed {
            return Err(PartyError::Unauthorized(connection_id.to_string()));
        }

        Ok(room)
    }

    async fn broadcast(&self, room: &Room, except: Option<&str>, message: &ServerMessage) -> Result<()> {
        self.hub.send_many(&room.member_ids(), except, message).await
    }

    /// Member list followed by the readiness aggregate, to the whole room.
    async fn broadcast_membership(&self, room: &Room) -> Result<()> {
        self.broadcast(room, None, &ServerMessage::UserListUpdate { users: room.users.clone() })
            .await?;
        self.broadcast(
            room,
            None,
            &ServerMessage::ReadyStatus {
                all_ready: room.all_ready(),
            },
        )
        .await
    }
}

impl Default for PartyServer {
    fn default() -> Self {
        Self::new()
    }
}
