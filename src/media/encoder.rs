//! Encoder control facade
//!
//! Capture and encoding live in the host server; this crate drives them
//! through a narrow trait. The host hands an implementation to
//! [`Runtime::new`](crate::state::Runtime::new) together with the encoded
//! media queues.

use async_trait::async_trait;

use crate::error::Result;

/// Bounds applied to host-requested quality changes.
const BITRATE_RANGE_KBPS: (u32, u32) = (1_000, 150_000);
const FRAMERATE_RANGE: (u32, u32) = (30, 240);
const WIDTH_RANGE: (u32, u32) = (640, 7_680);
const HEIGHT_RANGE: (u32, u32) = (480, 4_320);

/// Stream quality requested by the session host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySettings {
    pub bitrate_kbps: u32,
    pub framerate: u32,
    pub width: u32,
    pub height: u32,
}

impl QualitySettings {
    /// Clamp every field to its supported range.
    pub fn clamped(self) -> Self {
        Self {
            bitrate_kbps: self.bitrate_kbps.clamp(BITRATE_RANGE_KBPS.0, BITRATE_RANGE_KBPS.1),
            framerate: self.framerate.clamp(FRAMERATE_RANGE.0, FRAMERATE_RANGE.1),
            width: self.width.clamp(WIDTH_RANGE.0, WIDTH_RANGE.1),
            height: self.height.clamp(HEIGHT_RANGE.0, HEIGHT_RANGE.1),
        }
    }
}

/// Control surface of the external capture/encode pipeline.
#[async_trait]
pub trait EncoderControl: Send + Sync {
    /// Start capture and encoding. Called when the first peer joins.
    async fn start_capture(&self) -> Result<()>;

    /// Stop capture and encoding. Called when the last room closes.
    async fn stop_capture(&self);

    /// Ask the encoder for an IDR frame so a (re)joining viewer can start
    /// decoding without waiting for the next GOP.
    fn request_idr(&self);

    /// Apply new quality settings. Values arrive pre-clamped. The encoder
    /// may require a stream restart for resolution changes.
    async fn apply_quality(&self, quality: QualitySettings) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quality_clamping() {
        let q = QualitySettings {
            bitrate_kbps: 500,
            framerate: 500,
            width: 320,
            height: 10_000,
        }
        .clamped();

        assert_eq!(q.bitrate_kbps, 1_000);
        assert_eq!(q.framerate, 240);
        assert_eq!(q.width, 640);
        assert_eq!(q.height, 4_320);
    }

    #[test]
    fn test_quality_in_range_untouched() {
        let q = QualitySettings {
            bitrate_kbps: 20_000,
            framerate: 60,
            width: 1920,
            height: 1080,
        };
        assert_eq!(q.clamped(), q);
    }
}
