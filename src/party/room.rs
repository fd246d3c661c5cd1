use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::error::{PartyError, Result};

pub const ROOM_CODE_LEN: usize = 6;
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const MAX_CODE_ATTEMPTS: usize = 32;
const MAX_USERNAME_CHARS: usize = 32;

/// Shared handle to one room; holding its lock serializes that room's transitions.
pub type RoomHandle = Arc<Mutex<Room>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub is_host: bool,
    pub is_ready: bool,
}

impl User {
    pub fn host(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            is_host: true,
            is_ready: false,
        }
    }

    pub fn guest(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            is_host: false,
            is_ready: false,
        }
    }
}

/// What happened to a room when a member left.
#[derive(Debug, Clone, PartialEq)]
pub enum Departure {
    /// The host left; the room is gone and these ids were still inside.
    Closed { remaining: Vec<String> },
    /// A guest left; the room lives on.
    Left,
    /// The connection was not a member (already removed).
    NotMember,
}

#[derive(Debug)]
pub struct Room {
    pub code: String,
    pub host_id: String,
    pub users: Vec<User>,
    pub subtitle_data: Option<Value>,
    pub subtitle_name: Option<String>,
    pub is_playing: bool,
    pub current_time: f64,
    pub last_sync_time: u64,
    /// Set when the host leaves, so handlers that fetched the handle earlier see it as gone
    pub closed: bool,
}

impl Room {
    fn new(code: String, host: User) -> Self {
        Self {
            code,
            host_id: host.id.clone(),
            users: vec![host],
            subtitle_data: None,
            subtitle_name: None,
            is_playing: false,
            current_time: 0.0,
            last_sync_time: now_millis(),
            closed: false,
        }
    }

    pub fn is_host(&self, connection_id: &str) -> bool {
        self.host_id == connection_id
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.users.iter().any(|u| u.id == connection_id)
    }

    pub fn user(&self, connection_id: &str) -> Option<&User> {
        self.users.iter().find(|u| u.id == connection_id)
    }

    pub fn member_ids(&self) -> Vec<String> {
        self.users.iter().map(|u| u.id.clone()).collect()
    }

    pub fn all_ready(&self) -> bool {
        self.users.iter().all(|u| u.is_ready)
    }

    /// Marks a member ready. Returns false if the connection isn't in the room.
    pub fn mark_ready(&mut self, connection_id: &str) -> bool {
        match self.users.iter_mut().find(|u| u.id == connection_id) {
            Some(user) => {
                user.is_ready = true;
                true
            }
            None => false,
        }
    }

    /// Records an authoritative playback position.
    pub fn sync_to(&mut self, current_time: f64, playing: Option<bool>) {
        if let Some(playing) = playing {
            self.is_playing = playing;
        }
        self.current_time = current_time;
        self.last_sync_time = now_millis();
    }
}

/// Owns every live room, keyed by its uppercase code.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, RoomHandle>>,
}

impl RoomRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            rooms: RwLock::new(HashMap::new()),
        })
    }

    /// Generate a random room code
    fn generate_room_code() -> String {
        let mut rng = rand::thread_rng();
        (0..ROOM_CODE_LEN)
            .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
            .collect()
    }

    /// Create a new room with the given connection as host
    pub async fn create_room(
        &self,
        host_id: &str,
        username: Option<&str>,
    ) -> Result<(String, RoomHandle)> {
        let name = sanitize_username(username).unwrap_or_else(|| "Host".to_string());
        let mut rooms = self.rooms.write().await;

        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = Self::generate_room_code();
            if rooms.contains_key(&code) {
                tracing::debug!(room_code = %code, "Room code collision, retrying");
                continue;
            }

            let room = Arc::new(Mutex::new(Room::new(
                code.clone(),
                User::host(host_id, name),
            )));
            rooms.insert(code.clone(), room.clone());

            tracing::info!(room_code = %code, host_id = %host_id, "Room created");
            return Ok((code, room));
        }

        Err(PartyError::RoomCodeExhausted(MAX_CODE_ATTEMPTS))
    }

    /// Join an existing room as a guest. The caller gets the room locked so it
    /// can send the join notifications before any other transition runs.
    pub async fn join_room(
        &self,
        room_code: &str,
        guest_id: &str,
        username: Option<&str>,
    ) -> Result<tokio::sync::OwnedMutexGuard<Room>> {
        let code = normalize_room_code(room_code)?;
        let handle = self
            .get_room(&code)
            .await
            .ok_or_else(|| PartyError::RoomNotFound(code.clone()))?;

        let mut room = handle.lock_owned().await;
        if room.closed {
            return Err(PartyError::RoomNotFound(code));
        }

        if !room.contains(guest_id) {
            let name = sanitize_username(username)
                .unwrap_or_else(|| format!("User {}", room.users.len() + 1));
            room.users.push(User::guest(guest_id, name));
            tracing::info!(guest_id = %guest_id, room_code = %code, "Guest joined room");
        }

        Ok(room)
    }

    /// Get room information
    pub async fn get_room(&self, room_code: &str) -> Option<RoomHandle> {
        let rooms = self.rooms.read().await;
        rooms.get(room_code).cloned()
    }

    /// Remove a member from an already locked room. If the member is the host
    /// the room is marked closed and dropped from the registry in the same step.
    pub async fn remove_user(&self, room: &mut Room, connection_id: &str) -> Departure {
        if room.closed || !room.contains(connection_id) {
            return Departure::NotMember;
        }

        room.users.retain(|u| u.id != connection_id);

        if room.is_host(connection_id) {
            room.closed = true;
            self.rooms.write().await.remove(&room.code);
            tracing::info!(room_code = %room.code, "Host left, closing room");
            Departure::Closed {
                remaining: room.member_ids(),
            }
        } else {
            tracing::info!(
                connection_id = %connection_id,
                room_code = %room.code,
                "Guest left room"
            );
            Departure::Left
        }
    }
}

/// Validates a client-supplied room code and returns its canonical uppercase form.
pub fn normalize_room_code(raw: &str) -> Result<String> {
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(PartyError::InvalidRoomCode(raw.to_string()));
    }
    Ok(raw.to_ascii_uppercase())
}

/// Trims, bounds and HTML-escapes a display name. `None` when nothing is left.
pub fn sanitize_username(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    let bounded: String = trimmed.chars().take(MAX_USERNAME_CHARS).collect();
    Some(html_escape::encode_safe(&bounded).into_owned())
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
