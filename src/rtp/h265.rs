//! H.265/HEVC RTP packetization (RFC 7798)
//!
//! H.265 NAL unit header (2 bytes):
//! ```text
//! +---------------+---------------+
//! |0|1|2|3|4|5|6|7|0|1|2|3|4|5|6|7|
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |F|   Type    |  LayerId  | TID |
//! +---------------+---------------+
//! ```
//!
//! Fragmentation Units (type 49) keep the original F bit, layer id and TID in
//! the rewritten payload header; the third byte carries S/E flags plus the
//! original NAL type.

use bytes::{BufMut, Bytes, BytesMut};

use super::{annex_b_units, RtpChunk};

/// FU packet type.
const FU_TYPE: u8 = 49;

/// H.265 NAL header size in bytes.
const NAL_HEADER_SIZE: usize = 2;

/// Rewritten NAL header + FU header overhead per fragment.
const FU_OVERHEAD: usize = 3;

/// Packetize one Annex-B H.265 access unit.
///
/// Same contract as the H.264 packetizer: one chunk per RTP payload, marker
/// on the final chunk of the frame, empty output for malformed input.
pub fn packetize(frame: &[u8], max_payload: usize) -> Vec<RtpChunk> {
    let units = annex_b_units(frame);
    let mut chunks = Vec::new();

    for (idx, &(start, end)) in units.iter().enumerate() {
        let last_nal = idx == units.len() - 1;
        let nal = &frame[start..end];

        // A NAL shorter than its own header is garbage
        if nal.len() < NAL_HEADER_SIZE {
            continue;
        }

        if nal.len() <= max_payload {
            chunks.push(RtpChunk {
                payload: Bytes::copy_from_slice(nal),
                marker: last_nal,
            });
        } else {
            fragment(nal, last_nal, max_payload, &mut chunks);
        }
    }

    chunks
}

/// Emit FU fragments for one oversized NAL unit.
fn fragment(nal: &[u8], last_nal: bool, max_payload: usize, chunks: &mut Vec<RtpChunk>) {
    let nal_type = (nal[0] >> 1) & 0x3F;

    // Payload header for FU packets: F bit and layer-id MSB preserved from
    // the original, type replaced by 49; second byte (layer-id low bits +
    // TID) carried through untouched.
    let header0 = (nal[0] & 0b1000_0001) | (FU_TYPE << 1);
    let header1 = nal[1];

    let body = &nal[NAL_HEADER_SIZE..];
    let max_fragment = max_payload - FU_OVERHEAD;
    let mut offset = 0;

    while offset < body.len() {
        let fragment_size = max_fragment.min(body.len() - offset);
        let first = offset == 0;
        let last = offset + fragment_size >= body.len();

        let mut payload = BytesMut::with_capacity(FU_OVERHEAD + fragment_size);
        payload.put_u8(header0);
        payload.put_u8(header1);

        let mut fu_header = nal_type;
        if first {
            fu_header |= 0x80;
        }
        if last {
            fu_header |= 0x40;
        }
        payload.put_u8(fu_header);
        payload.put_slice(&body[offset..offset + fragment_size]);

        chunks.push(RtpChunk {
            payload: payload.freeze(),
            marker: last && last_nal,
        });

        offset += fragment_size;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtp::MAX_PAYLOAD;

    fn annex_b(nal: &[u8]) -> Vec<u8> {
        let mut frame = vec![0x00, 0x00, 0x00, 0x01];
        frame.extend_from_slice(nal);
        frame
    }

    #[test]
    fn test_small_nal_passthrough() {
        // IDR_W_RADL (type 19), TID 1
        let frame = annex_b(&[0x26, 0x01, 0xAA, 0xBB]);
        let chunks = packetize(&frame, MAX_PAYLOAD);
        assert_eq!(chunks.len(), 1);
        assert_eq!(&chunks[0].payload[..], &[0x26, 0x01, 0xAA, 0xBB]);
        assert!(chunks[0].marker);
    }

    #[test]
    fn test_fu_header_layout() {
        let mut nal = vec![0x26, 0x01];
        nal.extend(vec![0xCC; 3000]);
        let chunks = packetize(&annex_b(&nal), MAX_PAYLOAD);
        assert!(chunks.len() > 1);

        for (i, chunk) in chunks.iter().enumerate() {
            // Payload header type must read 49, layer/TID byte preserved
            assert_eq!((chunk.payload[0] >> 1) & 0x3F, 49);
            assert_eq!(chunk.payload[0], 0x62);
            assert_eq!(chunk.payload[1], 0x01);

            let fu_header = chunk.payload[2];
            assert_eq!(fu_header & 0x3F, 19, "FU type preserved");
            assert_eq!(fu_header & 0x80 != 0, i == 0, "START on first");
            assert_eq!(fu_header & 0x40 != 0, i == chunks.len() - 1, "END on last");
        }

        // Marker only on the final fragment
        assert_eq!(chunks.iter().filter(|c| c.marker).count(), 1);
        assert!(chunks.last().unwrap().marker);

        // Fragments reassemble the NAL body
        let mut body = Vec::new();
        for chunk in &chunks {
            body.extend_from_slice(&chunk.payload[3..]);
        }
        assert_eq!(body, &nal[2..]);
    }

    #[test]
    fn test_truncated_nal_dropped() {
        // One-byte NAL cannot carry an H.265 header
        let frame = annex_b(&[0x40]);
        assert!(packetize(&frame, MAX_PAYLOAD).is_empty());
    }

    #[test]
    fn test_parameter_sets_before_slice() {
        let mut frame = annex_b(&[0x40, 0x01, 0x0c]); // VPS
        frame.extend(annex_b(&[0x42, 0x01, 0x01])); // SPS
        frame.extend(annex_b(&[0x44, 0x01, 0xc0])); // PPS
        frame.extend(annex_b(&[0x26, 0x01, 0xAF])); // IDR
        let chunks = packetize(&frame, MAX_PAYLOAD);
        assert_eq!(chunks.len(), 4);
        assert!(chunks[..3].iter().all(|c| !c.marker));
        assert!(chunks[3].marker);
    }
}
