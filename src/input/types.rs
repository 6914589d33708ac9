//! Input event types

/// Gamepad button bitmap shared with the browser client.
pub mod buttons {
    pub const DPAD_UP: u16 = 0x0001;
    pub const DPAD_DOWN: u16 = 0x0002;
    pub const DPAD_LEFT: u16 = 0x0004;
    pub const DPAD_RIGHT: u16 = 0x0008;
    pub const START: u16 = 0x0010;
    pub const BACK: u16 = 0x0020;
    pub const LEFT_STICK: u16 = 0x0040;
    pub const RIGHT_STICK: u16 = 0x0080;
    pub const LEFT_SHOULDER: u16 = 0x0100;
    pub const RIGHT_SHOULDER: u16 = 0x0200;
    pub const HOME: u16 = 0x0400;
    pub const A: u16 = 0x1000;
    pub const B: u16 = 0x2000;
    pub const X: u16 = 0x4000;
    pub const Y: u16 = 0x8000;
}

/// Full state of one browser gamepad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GamepadState {
    /// Browser gamepad index.
    pub gamepad_id: u8,
    /// Button bitmap, see [`buttons`].
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub left_stick_x: i16,
    pub left_stick_y: i16,
    pub right_stick_x: i16,
    pub right_stick_y: i16,
}

/// Keyboard key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardEvent {
    /// Virtual key code.
    pub key_code: u16,
    /// Modifier bitmap (informational; the key stream carries modifiers as
    /// their own key events).
    pub modifiers: u8,
    pub pressed: bool,
}

/// Mouse movement, relative deltas or absolute normalized position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseMove {
    Relative { delta_x: i16, delta_y: i16 },
    Absolute { x: u16, y: u16 },
}

/// Mouse button event with the browser button index (0 = left, 1 = middle,
/// 2 = right).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseButtonEvent {
    pub button: u8,
    pub pressed: bool,
}

/// Mouse wheel event; positive y scrolls up, positive x scrolls right.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseScrollEvent {
    pub delta_x: i16,
    pub delta_y: i16,
}

/// Decoded input frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Gamepad(GamepadState),
    Keyboard(KeyboardEvent),
    MouseMove(MouseMove),
    MouseButton(MouseButtonEvent),
    MouseScroll(MouseScrollEvent),
}
