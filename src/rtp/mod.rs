//! RTP wire codec
//!
//! Turns encoded elementary-stream frames into RTP payloads:
//! - H.264 single-NAL / FU-A packetization (RFC 6184)
//! - H.265 single-NAL / FU packetization (RFC 7798)
//! - AV1 aggregation-header packetization
//!
//! The packetizers emit [`RtpChunk`]s (payload bytes plus the marker flag);
//! RTP headers are stamped later on the per-peer send path so that sequence
//! numbers stay strictly monotonic per peer track even when a slow peer's
//! queue drops packets.

pub mod av1;
pub mod h264;
pub mod h265;

use std::sync::atomic::{AtomicU16, Ordering};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Maximum RTP payload size in bytes, conservative for most networks.
pub const MAX_PAYLOAD: usize = 1200;

/// Dynamic payload type for the video track.
pub const VIDEO_PAYLOAD_TYPE: u8 = 96;

/// Dynamic payload type for the Opus audio track.
pub const AUDIO_PAYLOAD_TYPE: u8 = 111;

/// Video RTP clock rate (90 kHz for every supported codec).
pub const VIDEO_CLOCK_RATE: u32 = 90_000;

/// Audio RTP clock rate (48 kHz, Opus).
pub const AUDIO_CLOCK_RATE: u32 = 48_000;

/// RTP timestamp increment per video frame at the 30 fps baseline.
pub const VIDEO_TIMESTAMP_INCREMENT: u32 = 3000;

/// RTP timestamp increment per 10 ms Opus packet.
pub const AUDIO_TIMESTAMP_INCREMENT: u32 = 480;

/// Video codec carried on the peer video track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    H264,
    Hevc,
    Av1,
}

impl VideoCodec {
    /// Codec name as exchanged over signaling.
    pub fn name(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "H264",
            VideoCodec::Hevc => "HEVC",
            VideoCodec::Av1 => "AV1",
        }
    }

    /// Parse a signaling codec name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "H264" => Some(VideoCodec::H264),
            "HEVC" | "H265" => Some(VideoCodec::Hevc),
            "AV1" => Some(VideoCodec::Av1),
            _ => None,
        }
    }

    /// MIME type for SDP negotiation.
    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoCodec::H264 => "video/H264",
            VideoCodec::Hevc => "video/H265",
            VideoCodec::Av1 => "video/AV1",
        }
    }

    /// SDP fmtp parameters.
    pub fn sdp_fmtp(&self) -> &'static str {
        match self {
            VideoCodec::H264 => {
                "level-asymmetry-allowed=1;packetization-mode=1;profile-level-id=42e01f"
            }
            VideoCodec::Hevc => "level-id=180;profile-id=1;tier-flag=0;tx-mode=SRST",
            VideoCodec::Av1 => "profile=0",
        }
    }
}

impl std::fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One RTP payload produced from a frame, plus the marker flag for the
/// header. The marker is set only on the chunk carrying the final bytes of
/// the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RtpChunk {
    pub payload: Bytes,
    pub marker: bool,
}

/// Packetize one encoded video frame for the given codec.
///
/// Returns an empty vector for malformed input (no start code, empty frame);
/// callers count those as dropped frames.
pub fn packetize_frame(codec: VideoCodec, frame: &[u8], is_keyframe: bool) -> Vec<RtpChunk> {
    match codec {
        VideoCodec::H264 => h264::packetize(frame, MAX_PAYLOAD),
        VideoCodec::Hevc => h265::packetize(frame, MAX_PAYLOAD),
        VideoCodec::Av1 => av1::packetize(frame, is_keyframe, MAX_PAYLOAD),
    }
}

/// Monotonic RTP sequence counter for a single track, wrapping mod 2^16.
#[derive(Debug)]
pub struct RtpSequencer(AtomicU16);

impl RtpSequencer {
    pub fn new() -> Self {
        Self(AtomicU16::new(rand::random()))
    }

    /// Next sequence number. Wrapping is the natural u16 overflow.
    pub fn next(&self) -> u16 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for RtpSequencer {
    fn default() -> Self {
        Self::new()
    }
}

/// Locate the next Annex-B start code (`00 00 01` or `00 00 00 01`) at or
/// after `from`. Returns the start-code position and its length.
fn next_start_code(data: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut zeros = 0usize;
    for (i, &b) in data[from..].iter().enumerate() {
        if b == 0 {
            zeros += 1;
            continue;
        }
        if b == 1 && zeros >= 2 {
            let len = if zeros >= 3 { 4 } else { 3 };
            return Some((from + i + 1 - len, len));
        }
        zeros = 0;
    }
    None
}

/// Split an Annex-B elementary stream into NAL unit byte ranges, start codes
/// excluded. The scan walks the full buffer, so units ending at the last one
/// or two bytes are kept. Zero-length units are dropped.
pub(crate) fn annex_b_units(data: &[u8]) -> Vec<(usize, usize)> {
    let mut units = Vec::new();

    let Some((first, first_len)) = next_start_code(data, 0) else {
        return units;
    };

    let mut nal_start = first + first_len;
    loop {
        match next_start_code(data, nal_start) {
            Some((next, next_len)) => {
                if next > nal_start {
                    units.push((nal_start, next));
                }
                nal_start = next + next_len;
            }
            None => {
                if data.len() > nal_start {
                    units.push((nal_start, data.len()));
                }
                break;
            }
        }
    }

    units
}
