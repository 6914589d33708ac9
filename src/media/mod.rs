//! Media fan-out
//!
//! Consumes encoded frames from the host encoder's queues, packetizes them
//! once, and broadcasts the resulting RTP payloads to every connected peer
//! through the peer registry.

pub mod audio_sender;
pub mod encoder;
pub mod frame;
pub mod video_sender;

pub use audio_sender::{AudioSender, AudioSenderStats};
pub use encoder::{EncoderControl, QualitySettings};
pub use frame::{EncodedVideoFrame, MediaKind, MediaPacket, OpusPacket};
pub use video_sender::{VideoSender, VideoSenderStats};

use std::time::Duration;

/// Timed-pop interval on the encoded media queues, so sender tasks observe
/// shutdown even when the encoder goes quiet.
pub(crate) const QUEUE_POP_TIMEOUT: Duration = Duration::from_millis(100);
