//! Browser input injection
//!
//! Binary input frames arrive on each peer's unreliable `input` data channel,
//! get decoded once at the entry point, checked against the room's
//! permissions, and forwarded to the host's virtual input devices through
//! the [`SystemInput`] facade.

pub mod router;
pub mod types;
pub mod wire;

pub use router::{InputRouter, InputStatsSnapshot};
pub use types::{
    GamepadState, InputEvent, KeyboardEvent, MouseButtonEvent, MouseMove, MouseScrollEvent,
};

use async_trait::async_trait;

use crate::error::Result;

/// Virtual input device facade implemented by the host server.
///
/// Mouse buttons use the host numbering (1 = left, 2 = middle, 3 = right,
/// 4/5 = extra); the router translates browser button indexes before calling
/// in. Absolute mouse coordinates are normalized to the full `u16` range.
#[async_trait]
pub trait SystemInput: Send + Sync {
    /// Key event. `release` is true for key-up.
    async fn keyboard(&self, key_code: u16, release: bool) -> Result<()>;

    /// Relative mouse movement.
    async fn mouse_move_rel(&self, delta_x: i16, delta_y: i16) -> Result<()>;

    /// Absolute mouse position, normalized to 0..=65535.
    async fn mouse_move_abs(&self, x: u16, y: u16) -> Result<()>;

    /// Mouse button event.
    async fn mouse_button(&self, button: u8, pressed: bool) -> Result<()>;

    /// Scroll by `amount`, vertically unless `horizontal` is set.
    async fn mouse_scroll(&self, amount: i16, horizontal: bool) -> Result<()>;

    /// Full gamepad state for a server slot.
    async fn gamepad(&self, server_slot: u8, state: GamepadState) -> Result<()>;

    /// Release every held key and button. Called when a peer that was
    /// allowed to inject input leaves, so nothing stays stuck down.
    async fn reset(&self) -> Result<()>;
}
