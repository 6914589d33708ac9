//! Encoded media frame and packet types

use bytes::Bytes;

/// Which track a packet belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

/// One RTP payload queued toward a single peer. Immutable once enqueued; the
/// peer's sender task stamps the header (sequence number, SSRC, payload type)
/// when it writes to the track.
#[derive(Debug, Clone)]
pub struct MediaPacket {
    pub kind: MediaKind,
    pub payload: Bytes,
    /// RTP timestamp (90 kHz for video, 48 kHz for audio).
    pub timestamp: u32,
    /// Marker flag for the RTP header.
    pub marker: bool,
}

/// An encoded video frame as produced by the external encoder: one access
/// unit (Annex-B for H.264/H.265, a temporal unit for AV1).
#[derive(Debug, Clone)]
pub struct EncodedVideoFrame {
    pub data: Bytes,
    pub is_keyframe: bool,
    /// Monotonic frame counter from the encoder, used to derive the RTP
    /// timestamp.
    pub frame_index: u64,
}

/// One encoded Opus packet (10 ms of audio).
#[derive(Debug, Clone)]
pub struct OpusPacket {
    pub data: Bytes,
}
