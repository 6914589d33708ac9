//! Room registry
//!
//! Owns every active room and a peer-id index into them. Both indexes live
//! under one lock and are always updated together.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use rand::Rng;
use tracing::info;

use super::Room;
use crate::error::{Error, Result};

/// Room code alphabet: A-Z and 2-9 minus the ambiguous 0/O and 1/I/l.
const ROOM_CODE_CHARS: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Room code length.
pub const ROOM_CODE_LENGTH: usize = 6;

/// Collision retries before giving up on code generation.
const CODE_RETRIES: usize = 10;

#[derive(Default)]
struct Indexes {
    rooms: HashMap<String, Arc<Room>>,
    peer_to_room: HashMap<String, String>,
}

#[derive(Default)]
pub struct RoomRegistry {
    inner: Mutex<Indexes>,
}

impl RoomRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Generate a 6-character room code from the unambiguous alphabet.
    pub fn generate_code() -> String {
        let mut rng = rand::thread_rng();
        (0..ROOM_CODE_LENGTH)
            .map(|_| ROOM_CODE_CHARS[rng.gen_range(0..ROOM_CODE_CHARS.len())] as char)
            .collect()
    }

    /// Create a room with a fresh random code and register the host.
    pub fn create_room(
        &self,
        host_id: &str,
        host_name: &str,
        max_players: u8,
    ) -> Result<Arc<Room>> {
        let mut inner = self.inner.lock();

        let mut code = Self::generate_code();
        let mut attempts = 0;
        while inner.rooms.contains_key(&code) {
            attempts += 1;
            if attempts >= CODE_RETRIES {
                return Err(Error::Internal(
                    "failed to generate a unique room code".to_string(),
                ));
            }
            code = Self::generate_code();
        }

        let room = Arc::new(Room::new(&code, host_id, host_name, max_players));
        inner.rooms.insert(code.clone(), room.clone());
        inner.peer_to_room.insert(host_id.to_string(), code);
        Ok(room)
    }

    /// Register an externally created room (fixed-code single session) and
    /// index its host.
    pub fn insert_room(&self, room: Arc<Room>) {
        let mut inner = self.inner.lock();
        inner
            .peer_to_room
            .insert(room.host_peer_id().to_string(), room.code().to_string());
        inner.rooms.insert(room.code().to_string(), room);
    }

    /// Index a peer that joined an existing room.
    pub fn register_peer(&self, peer_id: &str, code: &str) {
        self.inner
            .lock()
            .peer_to_room
            .insert(peer_id.to_string(), code.to_string());
    }

    /// Drop a peer from the index (membership itself lives in the room).
    pub fn unregister_peer(&self, peer_id: &str) {
        self.inner.lock().peer_to_room.remove(peer_id);
    }

    pub fn find(&self, code: &str) -> Option<Arc<Room>> {
        self.inner.lock().rooms.get(code).cloned()
    }

    pub fn find_by_peer(&self, peer_id: &str) -> Option<Arc<Room>> {
        let inner = self.inner.lock();
        let code = inner.peer_to_room.get(peer_id)?;
        inner.rooms.get(code).cloned()
    }

    /// Remove a room and every peer index entry pointing at it.
    pub fn remove(&self, code: &str) {
        let mut inner = self.inner.lock();
        if inner.rooms.remove(code).is_none() {
            return;
        }
        inner.peer_to_room.retain(|_, room_code| room_code != code);
        info!(room = %code, "room removed");
    }

    pub fn rooms(&self) -> Vec<Arc<Room>> {
        self.inner.lock().rooms.values().cloned().collect()
    }

    pub fn room_count(&self) -> usize {
        self.inner.lock().rooms.len()
    }
}
