//! Frame encoding for the vendor wire protocol
//!
//! Pure functions: bytes in, ordered transport chunks out. No I/O and no
//! state lives here; the device handles own delivery.

use zerocopy::{FromBytes, IntoBytes};

use crate::capabilities::Capabilities;
use crate::error::DeviceError;
use crate::protocol::{self, segment, WireHeader, HEADER_LEN, REPORT_ID};
use crate::types::{PixelFormat, TransportChunk};

/// Encode one frame into the ordered chunk sequence for a device class.
///
/// The logical buffer is the 20-byte header followed by the payload,
/// split into pieces of at most `max_chunk` bytes: exactly
/// `ceil((20 + payload.len()) / max_chunk)` chunks, each prefixed with
/// the report id. Only the first chunk carries header bytes; the final
/// chunk is short unless the total divides evenly. A zero-length payload
/// is valid and produces a single header-only chunk (blank/keep-alive
/// frame).
///
/// Fails with `UnsupportedFormat` when the format is not advertised by
/// the capabilities; no partial output is produced on failure. Physical
/// report padding, where the transport requires it, is the transport's
/// concern.
pub fn encode_frame(
    caps: &Capabilities,
    format: PixelFormat,
    payload: &[u8],
) -> Result<Vec<TransportChunk>, DeviceError> {
    if !caps.supports(format) {
        return Err(DeviceError::UnsupportedFormat(format));
    }
    // A chunk size that cannot fit the header is a broken capability
    // table, not a runtime condition.
    assert!(
        caps.max_chunk >= HEADER_LEN,
        "chunk size {} cannot fit the {}-byte frame header",
        caps.max_chunk,
        HEADER_LEN
    );

    let payload_len = u32::try_from(payload.len())
        .map_err(|_| DeviceError::InvalidParameter(format!("payload of {} bytes", payload.len())))?;

    let header = WireHeader::image(
        caps.width,
        caps.height,
        protocol::compression_code(format),
        payload_len,
    );

    let mut logical = Vec::with_capacity(HEADER_LEN + payload.len());
    logical.extend_from_slice(header.as_bytes());
    logical.extend_from_slice(payload);

    Ok(logical
        .chunks(caps.max_chunk)
        .map(|piece| TransportChunk::new(REPORT_ID, piece))
        .collect())
}

/// Decode the frame header back from encoded bytes.
///
/// Reads the leading 20 bytes of a reassembled frame (or of the first
/// chunk's payload). Returns `None` when fewer than 20 bytes are given.
pub fn decode_header(bytes: &[u8]) -> Option<WireHeader> {
    WireHeader::read_from_prefix(bytes).ok().map(|(header, _)| header)
}

/// Build the single fixed-size report for the segment display variant.
///
/// Two-byte magic prefix followed by the two readout values, each
/// clamped to the two digits the hardware can show. The remainder of the
/// report is zero.
pub fn encode_readings(left: u8, right: u8) -> [u8; 1 + segment::REPORT_LEN] {
    let mut report = [0u8; 1 + segment::REPORT_LEN];
    report[0] = REPORT_ID;
    report[1..3].copy_from_slice(&segment::MAGIC);
    report[3] = left.min(segment::MAX_READING);
    report[4] = right.min(segment::MAX_READING);
    report
}
