//! Input router
//!
//! Decodes input frames from the data channel, enforces the permissions held
//! by the peer's room, and drives the [`SystemInput`] facade. Everything that
//! fails a check is dropped silently (with a counter); input is best-effort
//! by design.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, trace};

use super::types::{InputEvent, MouseMove};
use super::{wire, SystemInput};
use crate::room::RoomRegistry;

#[derive(Debug, Default)]
struct InputStats {
    forwarded: AtomicU64,
    dropped_no_room: AtomicU64,
    dropped_permission: AtomicU64,
    dropped_malformed: AtomicU64,
}

/// Point-in-time copy of the router counters.
#[derive(Debug, Clone, Default)]
pub struct InputStatsSnapshot {
    pub forwarded: u64,
    pub dropped_no_room: u64,
    pub dropped_permission: u64,
    pub dropped_malformed: u64,
}

pub struct InputRouter {
    rooms: Arc<RoomRegistry>,
    system: Arc<dyn SystemInput>,
    stats: InputStats,
}

impl InputRouter {
    pub fn new(rooms: Arc<RoomRegistry>, system: Arc<dyn SystemInput>) -> Arc<Self> {
        Arc::new(Self {
            rooms,
            system,
            stats: InputStats::default(),
        })
    }

    pub fn stats(&self) -> InputStatsSnapshot {
        InputStatsSnapshot {
            forwarded: self.stats.forwarded.load(Ordering::Relaxed),
            dropped_no_room: self.stats.dropped_no_room.load(Ordering::Relaxed),
            dropped_permission: self.stats.dropped_permission.load(Ordering::Relaxed),
            dropped_malformed: self.stats.dropped_malformed.load(Ordering::Relaxed),
        }
    }

    /// Release all held inputs on the host. Used when a peer with input
    /// permissions disappears mid-keystroke.
    pub async fn reset(&self) {
        if let Err(e) = self.system.reset().await {
            debug!(error = %e, "input reset failed");
        }
    }

    /// Route one raw input frame from a peer's data channel.
    pub async fn route(&self, peer_id: &str, data: &[u8]) {
        let Some(event) = wire::decode(data) else {
            self.stats.dropped_malformed.fetch_add(1, Ordering::Relaxed);
            return;
        };

        let Some(room) = self.rooms.find_by_peer(peer_id) else {
            self.stats.dropped_no_room.fetch_add(1, Ordering::Relaxed);
            trace!(peer = %peer_id, "input from peer outside any room");
            return;
        };

        let result = match event {
            InputEvent::Gamepad(state) => {
                // Spectators have no gamepad access
                match room.player(peer_id) {
                    Some(player) if !player.is_spectator => {}
                    _ => {
                        self.stats.dropped_permission.fetch_add(1, Ordering::Relaxed);
                        return;
                    }
                }

                // First event from an unclaimed browser gamepad claims a
                // server slot implicitly.
                let server_slot = match room.gamepad_slot(peer_id, state.gamepad_id) {
                    Some(slot) => slot,
                    None => match room.claim_gamepad(peer_id, state.gamepad_id) {
                        Ok(slot) => slot,
                        Err(e) => {
                            debug!(peer = %peer_id, error = %e, "gamepad auto-claim failed");
                            return;
                        }
                    },
                };

                self.system.gamepad(server_slot, state).await
            }

            InputEvent::Keyboard(event) => {
                if !room.can_use_keyboard(peer_id) {
                    self.stats.dropped_permission.fetch_add(1, Ordering::Relaxed);
                    trace!(peer = %peer_id, "keyboard event without permission");
                    return;
                }
                self.system.keyboard(event.key_code, !event.pressed).await
            }

            InputEvent::MouseMove(movement) => {
                if !room.can_use_mouse(peer_id) {
                    self.stats.dropped_permission.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                match movement {
                    MouseMove::Relative { delta_x, delta_y } => {
                        self.system.mouse_move_rel(delta_x, delta_y).await
                    }
                    MouseMove::Absolute { x, y } => self.system.mouse_move_abs(x, y).await,
                }
            }

            InputEvent::MouseButton(event) => {
                if !room.can_use_mouse(peer_id) {
                    self.stats.dropped_permission.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                // Browser buttons 0/1/2 map to host buttons 1/2/3
                self.system.mouse_button(event.button + 1, event.pressed).await
            }

            InputEvent::MouseScroll(event) => {
                if !room.can_use_mouse(peer_id) {
                    self.stats.dropped_permission.fetch_add(1, Ordering::Relaxed);
                    return;
                }
                let mut result = Ok(());
                if event.delta_y != 0 {
                    result = self.system.mouse_scroll(event.delta_y, false).await;
                }
                if event.delta_x != 0 {
                    let horizontal = self.system.mouse_scroll(event.delta_x, true).await;
                    result = result.and(horizontal);
                }
                result
            }
        };

        match result {
            Ok(()) => {
                self.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => debug!(peer = %peer_id, error = %e, "input device rejected event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::input::types::GamepadState;
    use crate::input::wire::{
        TAG_GAMEPAD_STATE, TAG_KEYBOARD, TAG_MOUSE_BUTTON, TAG_MOUSE_MOVE, TAG_MOUSE_SCROLL,
    };
    use crate::room::Room;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Keyboard(u16, bool),
        MouseMoveRel(i16, i16),
        MouseMoveAbs(u16, u16),
        MouseButton(u8, bool),
        MouseScroll(i16, bool),
        Gamepad(u8, GamepadState),
        Reset,
    }

    #[derive(Default)]
    struct RecordingInput {
        calls: Mutex<Vec<Call>>,
    }

    #[async_trait]
    impl SystemInput for RecordingInput {
        async fn keyboard(&self, key_code: u16, release: bool) -> Result<()> {
            self.calls.lock().push(Call::Keyboard(key_code, release));
            Ok(())
        }
        async fn mouse_move_rel(&self, dx: i16, dy: i16) -> Result<()> {
            self.calls.lock().push(Call::MouseMoveRel(dx, dy));
            Ok(())
        }
        async fn mouse_move_abs(&self, x: u16, y: u16) -> Result<()> {
            self.calls.lock().push(Call::MouseMoveAbs(x, y));
            Ok(())
        }
        async fn mouse_button(&self, button: u8, pressed: bool) -> Result<()> {
            self.calls.lock().push(Call::MouseButton(button, pressed));
            Ok(())
        }
        async fn mouse_scroll(&self, amount: i16, horizontal: bool) -> Result<()> {
            self.calls.lock().push(Call::MouseScroll(amount, horizontal));
            Ok(())
        }
        async fn gamepad(&self, slot: u8, state: GamepadState) -> Result<()> {
            self.calls.lock().push(Call::Gamepad(slot, state));
            Ok(())
        }
        async fn reset(&self) -> Result<()> {
            self.calls.lock().push(Call::Reset);
            Ok(())
        }
    }

    fn setup() -> (Arc<InputRouter>, Arc<RecordingInput>, Arc<RoomRegistry>) {
        let rooms = RoomRegistry::new();
        let system = Arc::new(RecordingInput::default());
        let router = InputRouter::new(rooms.clone(), system.clone());
        (router, system, rooms)
    }

    fn join_host(rooms: &RoomRegistry) -> Arc<Room> {
        let room = Arc::new(Room::new("STREAM", "peer_1", "Alice", 4));
        rooms.insert_room(room.clone());
        room
    }

    fn keyboard_frame(key: u16, pressed: bool) -> Vec<u8> {
        let mut frame = vec![TAG_KEYBOARD];
        frame.extend(key.to_le_bytes());
        frame.push(0);
        frame.push(pressed as u8);
        frame
    }

    #[tokio::test]
    async fn test_keyboard_release_mapping() {
        let (router, system, rooms) = setup();
        join_host(&rooms);

        router.route("peer_1", &keyboard_frame(0x41, true)).await;
        router.route("peer_1", &keyboard_frame(0x41, false)).await;

        // The facade takes a release flag, inverted from pressed
        assert_eq!(
            *system.calls.lock(),
            vec![Call::Keyboard(0x41, false), Call::Keyboard(0x41, true)]
        );
    }

    #[tokio::test]
    async fn test_peer_without_room_dropped() {
        let (router, system, _rooms) = setup();
        router.route("peer_9", &keyboard_frame(0x41, true)).await;
        assert!(system.calls.lock().is_empty());
        assert_eq!(router.stats().dropped_no_room, 1);
    }

    #[tokio::test]
    async fn test_keyboard_permission_enforced() {
        let (router, system, rooms) = setup();
        let room = join_host(&rooms);
        room.add_spectator("peer_2", "Bob").unwrap();
        rooms.register_peer("peer_2", "STREAM");
        room.promote_to_player("peer_2").unwrap();

        room.set_keyboard_access("peer_2", false);
        router.route("peer_2", &keyboard_frame(0x41, true)).await;

        assert!(system.calls.lock().is_empty());
        assert_eq!(router.stats().dropped_permission, 1);

        // Re-enabling takes effect immediately
        room.set_keyboard_access("peer_2", true);
        router.route("peer_2", &keyboard_frame(0x41, true)).await;
        assert_eq!(system.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_mouse_button_mapping() {
        let (router, system, rooms) = setup();
        join_host(&rooms);

        for (browser, host) in [(0u8, 1u8), (1, 2), (2, 3)] {
            router.route("peer_1", &[TAG_MOUSE_BUTTON, browser, 1]).await;
            assert!(system.calls.lock().contains(&Call::MouseButton(host, true)));
        }
    }

    #[tokio::test]
    async fn test_mouse_move_modes() {
        let (router, system, rooms) = setup();
        join_host(&rooms);

        let mut rel = vec![TAG_MOUSE_MOVE, 0x00];
        rel.extend(5i16.to_le_bytes());
        rel.extend((-7i16).to_le_bytes());
        router.route("peer_1", &rel).await;

        let mut abs = vec![TAG_MOUSE_MOVE, 0x01];
        abs.extend(100u16.to_le_bytes());
        abs.extend(200u16.to_le_bytes());
        router.route("peer_1", &abs).await;

        assert_eq!(
            *system.calls.lock(),
            vec![Call::MouseMoveRel(5, -7), Call::MouseMoveAbs(100, 200)]
        );
    }

    #[tokio::test]
    async fn test_scroll_splits_axes() {
        let (router, system, rooms) = setup();
        join_host(&rooms);

        let mut frame = vec![TAG_MOUSE_SCROLL, 0x00];
        frame.extend(4i16.to_le_bytes()); // dx
        frame.extend((-120i16).to_le_bytes()); // dy
        router.route("peer_1", &frame).await;

        assert_eq!(
            *system.calls.lock(),
            vec![Call::MouseScroll(-120, false), Call::MouseScroll(4, true)]
        );
    }

    #[tokio::test]
    async fn test_gamepad_auto_claim() {
        let (router, system, rooms) = setup();
        let room = join_host(&rooms);

        let mut frame = vec![TAG_GAMEPAD_STATE, 0];
        frame.extend([0u8; 12]);
        router.route("peer_1", &frame).await;
        router.route("peer_1", &frame).await;

        // First event claimed slot 0; both events land on the same slot
        let calls = system.calls.lock();
        assert_eq!(calls.len(), 2);
        assert!(matches!(calls[0], Call::Gamepad(0, _)));
        assert!(matches!(calls[1], Call::Gamepad(0, _)));
        drop(calls);
        assert_eq!(room.gamepad_slot("peer_1", 0), Some(0));
    }

    #[tokio::test]
    async fn test_gamepad_from_spectator_dropped() {
        let (router, system, rooms) = setup();
        let room = join_host(&rooms);
        room.add_spectator("peer_2", "Bob").unwrap();
        rooms.register_peer("peer_2", "STREAM");

        let mut frame = vec![TAG_GAMEPAD_STATE, 0];
        frame.extend([0u8; 12]);
        router.route("peer_2", &frame).await;

        assert!(system.calls.lock().is_empty());
        assert_eq!(router.stats().dropped_permission, 1);
    }

    #[tokio::test]
    async fn test_malformed_frame_counted() {
        let (router, system, rooms) = setup();
        join_host(&rooms);

        router.route("peer_1", &[TAG_KEYBOARD, 0x41]).await;
        assert!(system.calls.lock().is_empty());
        assert_eq!(router.stats().dropped_malformed, 1);
    }
}
