//! Session room
//!
//! Membership, player slots, gamepad slot assignment, and per-peer input
//! permissions for one streaming session. The room stores peer ids only;
//! signaling resolves them through the peer registry, so a room can never
//! keep a dead peer alive.
//!
//! Invariants:
//! - at most `max_players` non-spectators, each with a unique slot in 1..=4
//! - a server gamepad slot is owned by exactly one current member
//! - the host always has keyboard and mouse permission

pub mod registry;

pub use registry::RoomRegistry;

use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Slot value for spectators.
pub const SLOT_NONE: u8 = 0;

/// Hard cap on simultaneous connections per room, spectators included.
pub const MAX_ROOM_PEERS: usize = 16;

/// Server-side gamepad slot pool.
pub const MAX_GAMEPAD_SLOTS: u8 = 16;

/// One member of a room.
#[derive(Debug, Clone)]
pub struct PlayerInfo {
    pub peer_id: String,
    pub name: String,
    /// Player slot, `SLOT_NONE` for spectators.
    pub slot: u8,
    pub is_host: bool,
    pub is_spectator: bool,
    pub can_use_keyboard: bool,
    pub can_use_mouse: bool,
    /// Server gamepad slots claimed by this player.
    pub gamepad_slots: Vec<u8>,
    pub joined_at: Instant,
}

#[derive(Default)]
struct RoomState {
    players: HashMap<String, PlayerInfo>,
    /// server slot -> owning peer id
    gamepad_owners: HashMap<u8, String>,
    /// peer id -> (browser gamepad id -> server slot)
    gamepad_mappings: HashMap<String, HashMap<u8, u8>>,
    next_gamepad_slot: u8,
    default_keyboard: bool,
    default_mouse: bool,
}

/// One streaming session.
pub struct Room {
    code: String,
    host_id: String,
    max_players: u8,
    created_at: Instant,
    state: Mutex<RoomState>,
}

impl Room {
    /// Create a room with the given code; the creating peer becomes the host
    /// on slot 1 with full permissions.
    pub fn new(code: &str, host_id: &str, host_name: &str, max_players: u8) -> Self {
        let created_at = Instant::now();
        let mut state = RoomState {
            default_keyboard: true,
            default_mouse: true,
            ..Default::default()
        };

        state.players.insert(
            host_id.to_string(),
            PlayerInfo {
                peer_id: host_id.to_string(),
                name: host_name.to_string(),
                slot: 1,
                is_host: true,
                is_spectator: false,
                can_use_keyboard: true,
                can_use_mouse: true,
                gamepad_slots: Vec::new(),
                joined_at: created_at,
            },
        );

        info!(room = %code, host = %host_name, "room created");

        Self {
            code: code.to_string(),
            host_id: host_id.to_string(),
            max_players: max_players.clamp(1, 4),
            created_at,
            state: Mutex::new(state),
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn host_peer_id(&self) -> &str {
        &self.host_id
    }

    pub fn is_host(&self, peer_id: &str) -> bool {
        peer_id == self.host_id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Add a peer as a spectator.
    pub fn add_spectator(&self, peer_id: &str, name: &str) -> Result<()> {
        let mut state = self.state.lock();

        if state.players.contains_key(peer_id) {
            return Err(Error::AlreadyJoined);
        }
        if state.players.len() >= MAX_ROOM_PEERS {
            warn!(room = %self.code, "connection cap reached");
            return Err(Error::RoomFull);
        }

        state.players.insert(
            peer_id.to_string(),
            PlayerInfo {
                peer_id: peer_id.to_string(),
                name: name.to_string(),
                slot: SLOT_NONE,
                is_host: false,
                is_spectator: true,
                can_use_keyboard: false,
                can_use_mouse: false,
                gamepad_slots: Vec::new(),
                joined_at: Instant::now(),
            },
        );

        info!(room = %self.code, name = %name, "spectator joined");
        Ok(())
    }

    /// Promote a spectator to a player on the smallest free slot. Calling it
    /// on an existing player returns the slot it already holds.
    pub fn promote_to_player(&self, peer_id: &str) -> Result<u8> {
        let mut state = self.state.lock();

        let slot = {
            let Some(player) = state.players.get(peer_id) else {
                return Err(Error::NotInRoom);
            };
            if !player.is_spectator {
                return Ok(player.slot);
            }
            self.next_free_slot(&state).ok_or(Error::RoomFull)?
        };

        let default_keyboard = state.default_keyboard;
        let default_mouse = state.default_mouse;
        let player = state.players.get_mut(peer_id).expect("checked above");
        player.slot = slot;
        player.is_spectator = false;
        player.can_use_keyboard = default_keyboard;
        player.can_use_mouse = default_mouse;

        info!(room = %self.code, peer = %peer_id, slot, "promoted to player");
        Ok(slot)
    }

    /// Remove a peer, releasing every gamepad slot it owned. Returns true
    /// iff the removed peer was the host; the caller then destroys the room.
    /// Removing an absent peer is a no-op returning false.
    pub fn remove_peer(&self, peer_id: &str) -> bool {
        let mut state = self.state.lock();

        let Some(player) = state.players.remove(peer_id) else {
            return false;
        };

        if let Some(mapping) = state.gamepad_mappings.remove(peer_id) {
            for server_slot in mapping.values() {
                state.gamepad_owners.remove(server_slot);
            }
        }

        info!(room = %self.code, name = %player.name, "peer left room");
        player.is_host
    }

    /// Claim a server gamepad slot for a browser gamepad. Idempotent per
    /// (peer, browser id): the same pair always yields the same slot.
    pub fn claim_gamepad(&self, peer_id: &str, browser_id: u8) -> Result<u8> {
        let mut state = self.state.lock();

        match state.players.get(peer_id) {
            Some(player) if !player.is_spectator => {}
            Some(_) => return Err(Error::SpectatorInput),
            None => return Err(Error::NotInRoom),
        }

        if let Some(slot) = state
            .gamepad_mappings
            .get(peer_id)
            .and_then(|m| m.get(&browser_id))
        {
            return Ok(*slot);
        }

        if state.next_gamepad_slot >= MAX_GAMEPAD_SLOTS {
            warn!(room = %self.code, "gamepad slots exhausted");
            return Err(Error::GamepadExhausted);
        }
        let server_slot = state.next_gamepad_slot;
        state.next_gamepad_slot += 1;

        state
            .gamepad_owners
            .insert(server_slot, peer_id.to_string());
        state
            .gamepad_mappings
            .entry(peer_id.to_string())
            .or_default()
            .insert(browser_id, server_slot);
        if let Some(player) = state.players.get_mut(peer_id) {
            player.gamepad_slots.push(server_slot);
        }

        info!(room = %self.code, peer = %peer_id, browser_id, server_slot, "gamepad claimed");
        Ok(server_slot)
    }

    /// Release a server gamepad slot. Ownership is verified; releasing a
    /// slot the peer does not own is a no-op returning false.
    pub fn release_gamepad(&self, peer_id: &str, server_slot: u8) -> bool {
        let mut state = self.state.lock();

        match state.gamepad_owners.get(&server_slot) {
            Some(owner) if owner == peer_id => {}
            _ => {
                warn!(room = %self.code, peer = %peer_id, server_slot, "release of unowned gamepad slot");
                return false;
            }
        }

        state.gamepad_owners.remove(&server_slot);
        if let Some(mapping) = state.gamepad_mappings.get_mut(peer_id) {
            mapping.retain(|_, slot| *slot != server_slot);
        }
        if let Some(player) = state.players.get_mut(peer_id) {
            player.gamepad_slots.retain(|slot| *slot != server_slot);
        }

        true
    }

    /// Server slot already mapped to a browser gamepad, if any.
    pub fn gamepad_slot(&self, peer_id: &str, browser_id: u8) -> Option<u8> {
        self.state
            .lock()
            .gamepad_mappings
            .get(peer_id)
            .and_then(|m| m.get(&browser_id))
            .copied()
    }

    /// Owner of a server gamepad slot, used for rumble feedback routing.
    pub fn gamepad_owner(&self, server_slot: u8) -> Option<String> {
        self.state.lock().gamepad_owners.get(&server_slot).cloned()
    }

    /// Toggle keyboard access. The host cannot be downgraded.
    pub fn set_keyboard_access(&self, peer_id: &str, enabled: bool) -> bool {
        let mut state = self.state.lock();
        let Some(player) = state.players.get_mut(peer_id) else {
            return false;
        };
        if player.is_host {
            return true;
        }
        player.can_use_keyboard = enabled;
        info!(room = %self.code, name = %player.name, enabled, "keyboard access changed");
        true
    }

    /// Toggle mouse access. The host cannot be downgraded.
    pub fn set_mouse_access(&self, peer_id: &str, enabled: bool) -> bool {
        let mut state = self.state.lock();
        let Some(player) = state.players.get_mut(peer_id) else {
            return false;
        };
        if player.is_host {
            return true;
        }
        player.can_use_mouse = enabled;
        info!(room = %self.code, name = %player.name, enabled, "mouse access changed");
        true
    }

    pub fn can_use_keyboard(&self, peer_id: &str) -> bool {
        self.state
            .lock()
            .players
            .get(peer_id)
            .map(|p| p.can_use_keyboard)
            .unwrap_or(false)
    }

    pub fn can_use_mouse(&self, peer_id: &str) -> bool {
        self.state
            .lock()
            .players
            .get(peer_id)
            .map(|p| p.can_use_mouse)
            .unwrap_or(false)
    }

    /// Default permission applied to newly promoted players. Follows the
    /// most recent host toggle.
    pub fn set_default_keyboard_access(&self, enabled: bool) {
        self.state.lock().default_keyboard = enabled;
    }

    pub fn set_default_mouse_access(&self, enabled: bool) {
        self.state.lock().default_mouse = enabled;
    }

    pub fn default_keyboard_access(&self) -> bool {
        self.state.lock().default_keyboard
    }

    pub fn default_mouse_access(&self) -> bool {
        self.state.lock().default_mouse
    }

    /// Snapshot of every member.
    pub fn players(&self) -> Vec<PlayerInfo> {
        self.state.lock().players.values().cloned().collect()
    }

    pub fn player(&self, peer_id: &str) -> Option<PlayerInfo> {
        self.state.lock().players.get(peer_id).cloned()
    }

    pub fn peer_ids(&self) -> Vec<String> {
        self.state.lock().players.keys().cloned().collect()
    }

    /// Member count, spectators included.
    pub fn peer_count(&self) -> usize {
        self.state.lock().players.len()
    }

    /// Non-spectator count.
    pub fn player_count(&self) -> usize {
        self.state
            .lock()
            .players
            .values()
            .filter(|p| !p.is_spectator)
            .count()
    }

    pub fn is_full(&self) -> bool {
        self.player_count() >= self.max_players as usize
    }

    /// Smallest unused slot in 1..=max_players.
    fn next_free_slot(&self, state: &RoomState) -> Option<u8> {
        (1..=self.max_players)
            .find(|slot| !state.players.values().any(|p| !p.is_spectator && p.slot == *slot))
    }
}
