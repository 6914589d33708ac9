//! H.264 RTP packetization (RFC 6184)
//!
//! Single NAL unit packets for NALs that fit the payload budget, FU-A
//! fragmentation (type 28) for larger ones. STAP aggregation is not used;
//! parameter sets ride as their own packets.

use bytes::{BufMut, Bytes, BytesMut};

use super::{annex_b_units, RtpChunk};

/// FU-A packet type.
const FU_A_TYPE: u8 = 28;

/// NAL header size in bytes.
const NAL_HEADER_SIZE: usize = 1;

/// FU indicator + FU header overhead per fragment.
const FU_A_OVERHEAD: usize = 2;

/// Packetize one Annex-B H.264 access unit.
///
/// Returns one chunk per emitted RTP payload; the marker flag is set on the
/// chunk carrying the last bytes of the last NAL unit. Malformed input (no
/// start code) yields an empty vector.
pub fn packetize(frame: &[u8], max_payload: usize) -> Vec<RtpChunk> {
    let units = annex_b_units(frame);
    let mut chunks = Vec::new();

    for (idx, &(start, end)) in units.iter().enumerate() {
        let last_nal = idx == units.len() - 1;
        let nal = &frame[start..end];

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

/// Emit FU-A fragments for one oversized NAL unit.
///
/// The FU indicator keeps the original NRI bits with the type replaced by 28;
/// the FU header carries the original type with the START bit on the first
/// fragment and the END bit on the last.
fn fragment(nal: &[u8], last_nal: bool, max_payload: usize, chunks: &mut Vec<RtpChunk>) {
    let nal_header = nal[0];
    let indicator = (nal_header & 0x60) | FU_A_TYPE;
    let nal_type = nal_header & 0x1F;

    let body = &nal[NAL_HEADER_SIZE..];
    let max_fragment = max_payload - FU_A_OVERHEAD;
    let mut offset = 0;

    while offset < body.len() {
        let fragment_size = max_fragment.min(body.len() - offset);
        let first = offset == 0;
        let last = offset + fragment_size >= body.len();

        let mut payload = BytesMut::with_capacity(FU_A_OVERHEAD + fragment_size);
        payload.put_u8(indicator);

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
