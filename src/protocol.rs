//! Wire protocol constants and layout for CoreView displays
//!
//! The protocol was recovered by capturing the vendor application's USB
//! traffic. The byte layout below is reproduced exactly as observed; the
//! firmware rejects frames with any deviation in the header.

use zerocopy::byteorder::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::types::PixelFormat;

/// Frame header magic, the first four bytes of every LCD frame
pub const MAGIC: [u8; 4] = [0xDA, 0xDB, 0xDC, 0xDD];

/// Report id prefixed to every outbound report
pub const REPORT_ID: u8 = 0x00;

/// Size of the frame header in bytes, fixed for every pixel format
pub const HEADER_LEN: usize = 20;

/// Command bytes (frame header byte 4)
pub mod cmd {
    /// Image data frame
    pub const IMAGE: u8 = 0x02;
}

/// Compression codes (frame header byte 12)
pub mod compression {
    /// Raw RGB565 pixel stream
    pub const RGB565: u8 = 0x01;
    /// JPEG-encoded frame
    pub const JPEG: u8 = 0x02;
    /// Raw RGB888 pixel stream; defined by the firmware, not advertised
    /// by any current panel
    pub const RGB888: u8 = 0x03;
}

/// Segment-display report layout (CoreView Duo)
///
/// The Duo takes a single fixed-size report per update: a two-byte magic
/// prefix followed by the two readout values. No header, no fragmentation.
pub mod segment {
    /// Two-byte magic prefix of every segment report
    pub const MAGIC: [u8; 2] = [0xDC, 0xDD];
    /// Fixed report payload size, excluding the report id
    pub const REPORT_LEN: usize = 8;
    /// Largest value one readout can show (two digits)
    pub const MAX_READING: u8 = 99;
}

/// Wire compression code for a pixel format
pub fn compression_code(format: PixelFormat) -> u8 {
    match format {
        PixelFormat::Rgb565 => compression::RGB565,
        PixelFormat::Jpeg => compression::JPEG,
        PixelFormat::Rgb888 => compression::RGB888,
    }
}

/// Frame header for the full-LCD variant, 20 bytes on the wire.
///
/// Multi-byte fields are little-endian; reserved bytes are zero.
#[derive(Debug, Clone, Copy, IntoBytes, FromBytes, KnownLayout, Immutable)]
#[repr(C)]
pub struct WireHeader {
    pub magic: [u8; 4],
    pub command: u8,
    _reserved0: [u8; 3],
    pub width: U16,
    pub height: U16,
    pub compression: u8,
    _reserved1: [u8; 3],
    pub payload_len: U32,
}

const _: () = assert!(core::mem::size_of::<WireHeader>() == HEADER_LEN);

impl WireHeader {
    /// Build an image-data header for one frame.
    pub fn image(width: u16, height: u16, compression: u8, payload_len: u32) -> Self {
        Self {
            magic: MAGIC,
            command: cmd::IMAGE,
            _reserved0: [0; 3],
            width: U16::new(width),
            height: U16::new(height),
            compression,
            _reserved1: [0; 3],
            payload_len: U32::new(payload_len),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout() {
        let header = WireHeader::image(1280, 480, compression::JPEG, 1000);
        let bytes = header.as_bytes();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(
            bytes,
            &[
                0xDA, 0xDB, 0xDC, 0xDD, // magic
                0x02, // command: image data
                0x00, 0x00, 0x00, // reserved
                0x00, 0x05, // width 1280 LE
                0xE0, 0x01, // height 480 LE
                0x02, // compression: JPEG
                0x00, 0x00, 0x00, // reserved
                0xE8, 0x03, 0x00, 0x00, // payload length 1000 LE
            ]
        );
    }

    #[test]
    fn test_compression_codes() {
        assert_eq!(compression_code(PixelFormat::Rgb565), 0x01);
        assert_eq!(compression_code(PixelFormat::Jpeg), 0x02);
        assert_eq!(compression_code(PixelFormat::Rgb888), 0x03);
    }
}
