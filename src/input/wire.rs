//! Binary input frame format
//!
//! Every frame starts with a one-byte type tag; multi-byte fields are
//! little-endian.
//!
//! | Tag  | Event         | Layout after tag                                        |
//! |------|---------------|---------------------------------------------------------|
//! | 0x01 | GamepadState  | `u8 id, u16 buttons, u8 lt, u8 rt, i16 lx ly rx ry` (13)|
//! | 0x02 | GamepadRumble | server to client only                                   |
//! | 0x10 | KeyboardEvent | `u16 key_code, u8 modifiers, u8 pressed` (4)            |
//! | 0x20 | MouseMove     | `u8 flags, i16/u16 x, i16/u16 y` (5), flag bit 0 = abs  |
//! | 0x21 | MouseButton   | `u8 button, u8 pressed` (2)                             |
//! | 0x22 | MouseScroll   | `u8 reserved, i16 dx, i16 dy` (5)                       |

use tracing::warn;

use super::types::{
    GamepadState, InputEvent, KeyboardEvent, MouseButtonEvent, MouseMove, MouseScrollEvent,
};

pub const TAG_GAMEPAD_STATE: u8 = 0x01;
pub const TAG_GAMEPAD_RUMBLE: u8 = 0x02;
pub const TAG_KEYBOARD: u8 = 0x10;
pub const TAG_MOUSE_MOVE: u8 = 0x20;
pub const TAG_MOUSE_BUTTON: u8 = 0x21;
pub const TAG_MOUSE_SCROLL: u8 = 0x22;

/// Flag bit selecting absolute mouse coordinates.
const MOUSE_MOVE_ABSOLUTE: u8 = 0x01;

fn u16_le(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn i16_le(data: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([data[at], data[at + 1]])
}

/// Decode one input frame. Undersized or unknown frames yield `None`.
pub fn decode(data: &[u8]) -> Option<InputEvent> {
    let Some(&tag) = data.first() else {
        warn!("empty input frame");
        return None;
    };

    match tag {
        TAG_GAMEPAD_STATE => {
            if data.len() < 14 {
                warn!(len = data.len(), "undersized gamepad frame");
                return None;
            }
            Some(InputEvent::Gamepad(GamepadState {
                gamepad_id: data[1],
                buttons: u16_le(data, 2),
                left_trigger: data[4],
                right_trigger: data[5],
                left_stick_x: i16_le(data, 6),
                left_stick_y: i16_le(data, 8),
                right_stick_x: i16_le(data, 10),
                right_stick_y: i16_le(data, 12),
            }))
        }

        TAG_KEYBOARD => {
            if data.len() < 5 {
                warn!(len = data.len(), "undersized keyboard frame");
                return None;
            }
            Some(InputEvent::Keyboard(KeyboardEvent {
                key_code: u16_le(data, 1),
                modifiers: data[3],
                pressed: data[4] != 0,
            }))
        }

        TAG_MOUSE_MOVE => {
            if data.len() < 6 {
                warn!(len = data.len(), "undersized mouse move frame");
                return None;
            }
            let movement = if data[1] & MOUSE_MOVE_ABSOLUTE != 0 {
                MouseMove::Absolute {
                    x: u16_le(data, 2),
                    y: u16_le(data, 4),
                }
            } else {
                MouseMove::Relative {
                    delta_x: i16_le(data, 2),
                    delta_y: i16_le(data, 4),
                }
            };
            Some(InputEvent::MouseMove(movement))
        }

        TAG_MOUSE_BUTTON => {
            if data.len() < 3 {
                warn!(len = data.len(), "undersized mouse button frame");
                return None;
            }
            Some(InputEvent::MouseButton(MouseButtonEvent {
                button: data[1],
                pressed: data[2] != 0,
            }))
        }

        TAG_MOUSE_SCROLL => {
            if data.len() < 6 {
                warn!(len = data.len(), "undersized mouse scroll frame");
                return None;
            }
            Some(InputEvent::MouseScroll(MouseScrollEvent {
                delta_x: i16_le(data, 2),
                delta_y: i16_le(data, 4),
            }))
        }

        TAG_GAMEPAD_RUMBLE => {
            // Rumble only flows server to client
            warn!("client sent rumble frame");
            None
        }

        other => {
            warn!(tag = format!("0x{other:02X}"), "unknown input frame tag");
            None
        }
    }
}

/// Encode a rumble frame for a claimed gamepad (server to client).
pub fn encode_rumble(server_slot: u8, low_freq: u16, high_freq: u16, duration_ms: u16) -> [u8; 8] {
    let low = low_freq.to_le_bytes();
    let high = high_freq.to_le_bytes();
    let duration = duration_ms.to_le_bytes();
    [
        TAG_GAMEPAD_RUMBLE,
        server_slot,
        low[0],
        low[1],
        high[0],
        high[1],
        duration[0],
        duration[1],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::types::buttons;

    #[test]
    fn test_decode_gamepad_state() {
        let mut frame = vec![TAG_GAMEPAD_STATE, 2];
        frame.extend((buttons::A | buttons::DPAD_UP).to_le_bytes()); // buttons
        frame.push(0x40); // lt
        frame.push(0xFF); // rt
        frame.extend((-32768i16).to_le_bytes()); // lx
        frame.extend(32767i16.to_le_bytes()); // ly
        frame.extend(0i16.to_le_bytes()); // rx
        frame.extend((-1i16).to_le_bytes()); // ry

        let Some(InputEvent::Gamepad(state)) = decode(&frame) else {
            panic!("expected gamepad event");
        };
        assert_eq!(state.gamepad_id, 2);
        assert_eq!(state.buttons, buttons::A | buttons::DPAD_UP);
        assert_eq!(state.left_trigger, 0x40);
        assert_eq!(state.right_trigger, 0xFF);
        assert_eq!(state.left_stick_x, -32768);
        assert_eq!(state.left_stick_y, 32767);
        assert_eq!(state.right_stick_y, -1);
    }

    #[test]
    fn test_decode_keyboard() {
        // key_code 0x0041 ('A'), shift modifier, pressed
        let frame = [TAG_KEYBOARD, 0x41, 0x00, 0x02, 0x01];
        let Some(InputEvent::Keyboard(event)) = decode(&frame) else {
            panic!("expected keyboard event");
        };
        assert_eq!(event.key_code, 0x41);
        assert_eq!(event.modifiers, 0x02);
        assert!(event.pressed);
    }

    #[test]
    fn test_decode_mouse_move_relative() {
        let mut frame = vec![TAG_MOUSE_MOVE, 0x00];
        frame.extend(10i16.to_le_bytes());
        frame.extend((-10i16).to_le_bytes());

        assert_eq!(
            decode(&frame),
            Some(InputEvent::MouseMove(MouseMove::Relative {
                delta_x: 10,
                delta_y: -10
            }))
        );
    }

    #[test]
    fn test_decode_mouse_move_absolute() {
        let mut frame = vec![TAG_MOUSE_MOVE, 0x01];
        frame.extend(65535u16.to_le_bytes());
        frame.extend(32768u16.to_le_bytes());

        assert_eq!(
            decode(&frame),
            Some(InputEvent::MouseMove(MouseMove::Absolute {
                x: 65535,
                y: 32768
            }))
        );
    }

    #[test]
    fn test_decode_mouse_button_and_scroll() {
        assert_eq!(
            decode(&[TAG_MOUSE_BUTTON, 2, 1]),
            Some(InputEvent::MouseButton(MouseButtonEvent {
                button: 2,
                pressed: true
            }))
        );

        let mut frame = vec![TAG_MOUSE_SCROLL, 0x00];
        frame.extend(5i16.to_le_bytes());
        frame.extend((-120i16).to_le_bytes());
        assert_eq!(
            decode(&frame),
            Some(InputEvent::MouseScroll(MouseScrollEvent {
                delta_x: 5,
                delta_y: -120
            }))
        );
    }

    #[test]
    fn test_undersized_frames_rejected() {
        assert_eq!(decode(&[]), None);
        assert_eq!(decode(&[TAG_GAMEPAD_STATE, 0, 0]), None);
        assert_eq!(decode(&[TAG_KEYBOARD, 0x41]), None);
        assert_eq!(decode(&[TAG_MOUSE_MOVE, 0x00, 10]), None);
        assert_eq!(decode(&[TAG_MOUSE_BUTTON, 0]), None);
        assert_eq!(decode(&[TAG_MOUSE_SCROLL, 0, 0]), None);
    }

    #[test]
    fn test_rumble_and_unknown_tags_rejected() {
        let rumble = encode_rumble(3, 0x1234, 0xABCD, 500);
        assert_eq!(decode(&rumble), None);
        assert_eq!(decode(&[0x7F, 0, 0, 0, 0, 0]), None);
    }

    #[test]
    fn test_encode_rumble_layout() {
        let frame = encode_rumble(3, 0x1234, 0xABCD, 500);
        assert_eq!(frame[0], TAG_GAMEPAD_RUMBLE);
        assert_eq!(frame[1], 3);
        assert_eq!(u16::from_le_bytes([frame[2], frame[3]]), 0x1234);
        assert_eq!(u16::from_le_bytes([frame[4], frame[5]]), 0xABCD);
        assert_eq!(u16::from_le_bytes([frame[6], frame[7]]), 500);
    }
}
