//! coplay — server-side WebRTC fan-out for multi-peer game streaming
//!
//! Sits between an external encoder (H.264/HEVC/AV1 frames plus Opus
//! packets) and browser peers: every peer receives the same packetized
//! media, and players inject keyboard/mouse/gamepad input back into the host
//! machine over an unreliable data channel.
//!
//! ```text
//! encoder queues --> VideoSender/AudioSender --> packetizers (rtp)
//!                                                    |
//!                                        PeerRegistry::broadcast
//!                                         /        |        \
//!                                      Peer      Peer      Peer
//!                                       ^          ^          ^
//! browser <-- wss signaling --> SignalingController (rooms, SDP/ICE)
//! browser --> input channel --> InputRouter --> SystemInput facade
//! ```
//!
//! The host embeds the crate by implementing [`media::EncoderControl`] and
//! [`input::SystemInput`], then wiring a [`state::Runtime`].

pub mod config;
pub mod error;
pub mod input;
pub mod media;
pub mod room;
pub mod rtp;
pub mod signaling;
pub mod state;
pub mod webrtc;

pub use config::WebRtcSettings;
pub use error::{Error, Result};
pub use state::{MediaQueues, Runtime, RuntimeStats};
