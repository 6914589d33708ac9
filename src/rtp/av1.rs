//! AV1 RTP packetization
//!
//! AV1 aggregation header (one byte before the OBU data):
//! ```text
//! +-+-+-+-+-+-+-+-+
//! |Z|Y| W |N|-|-|-|
//! +-+-+-+-+-+-+-+-+
//! ```
//! Z: the first OBU element continues a previous packet,
//! Y: the last OBU element continues into the next packet,
//! W: number of OBU elements (0 = length-prefixed),
//! N: first packet of a new coded video sequence (keyframe).

use bytes::{BufMut, Bytes, BytesMut};

use super::RtpChunk;

const FLAG_Z: u8 = 0x80;
const FLAG_Y: u8 = 0x40;
const FLAG_N: u8 = 0x08;

/// W=1: exactly one OBU element filling the rest of the packet.
const W_ONE: u8 = 0x10;

/// Aggregation header size.
const AGG_HEADER_SIZE: usize = 1;

/// Packetize one AV1 temporal unit.
///
/// A frame that fits is sent as a single W=1 element; larger frames are cut
/// into fixed-size chunks with Z/Y continuation flags. The N bit is raised on
/// the first packet of a keyframe temporal unit. Empty frames produce no
/// packets.
pub fn packetize(frame: &[u8], is_keyframe: bool, max_payload: usize) -> Vec<RtpChunk> {
    if frame.is_empty() {
        return Vec::new();
    }

    let budget = max_payload - AGG_HEADER_SIZE;
    let mut chunks = Vec::new();

    if frame.len() <= budget {
        let mut header = W_ONE;
        if is_keyframe {
            header |= FLAG_N;
        }

        let mut payload = BytesMut::with_capacity(AGG_HEADER_SIZE + frame.len());
        payload.put_u8(header);
        payload.put_slice(frame);

        chunks.push(RtpChunk {
            payload: payload.freeze(),
            marker: true,
        });
        return chunks;
    }

    let mut offset = 0;
    let mut first = true;

    while offset < frame.len() {
        let fragment_size = budget.min(frame.len() - offset);
        let last = offset + fragment_size >= frame.len();

        let mut header = 0u8;
        if !first {
            header |= FLAG_Z;
        }
        if !last {
            header |= FLAG_Y;
        }
        if first && is_keyframe {
            header |= FLAG_N;
        }

        let mut payload = BytesMut::with_capacity(AGG_HEADER_SIZE + fragment_size);
        payload.put_u8(header);
        payload.put_slice(&frame[offset..offset + fragment_size]);

        chunks.push(RtpChunk {
            payload: payload.freeze(),
            marker: last,
        });

        offset += fragment_size;
        first = false;
    }

    chunks
}

/// Reassemble fragment payloads, used by tests to check the split.
#[cfg(test)]
fn reassemble(chunks: &[RtpChunk]) -> Bytes {
    let mut out = BytesMut::new();
    for chunk in chunks {
        out.put_slice(&chunk.payload[AGG_HEADER_SIZE..]);
    }
    out.freeze()
}
