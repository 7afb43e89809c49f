//! Per-device-class capability descriptions

use serde::Serialize;

use crate::protocol::segment;
use crate::types::PixelFormat;

/// Immutable description of one device class.
///
/// One static instance exists per supported hardware variant; handles
/// borrow it for their whole lifetime.
#[derive(Debug, Clone, Serialize)]
pub struct Capabilities {
    /// Horizontal resolution in pixels (0 for non-pixel displays)
    pub width: u16,
    /// Vertical resolution in pixels (0 for non-pixel displays)
    pub height: u16,
    /// Supported pixel formats, most preferred first
    pub formats: &'static [PixelFormat],
    /// Largest payload one transport chunk can carry
    pub max_chunk: usize,
    /// Advisory frame-rate ceiling in frames per second
    pub max_fps: u8,
    /// Panel supports brightness control
    pub has_brightness: bool,
    /// Panel supports rotation
    pub has_orientation: bool,
}

impl Capabilities {
    /// Check whether this class accepts frames in the given format
    pub fn supports(&self, format: PixelFormat) -> bool {
        self.formats.contains(&format)
    }

    /// Most preferred pixel format, if the class takes frames at all
    pub fn preferred_format(&self) -> Option<PixelFormat> {
        self.formats.first().copied()
    }
}

/// CoreView 8: 8.8" 1280x480 LCD bar
pub const COREVIEW_8: Capabilities = Capabilities {
    width: 1280,
    height: 480,
    formats: &[PixelFormat::Jpeg, PixelFormat::Rgb565],
    max_chunk: 512,
    max_fps: 25,
    has_brightness: true,
    has_orientation: true,
};

/// CoreView Duo: dual two-digit segment readout, no pixel surface
pub const COREVIEW_DUO: Capabilities = Capabilities {
    width: 0,
    height: 0,
    formats: &[],
    max_chunk: segment::REPORT_LEN,
    max_fps: 1,
    has_brightness: false,
    has_orientation: false,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preferred_format() {
        assert_eq!(COREVIEW_8.preferred_format(), Some(PixelFormat::Jpeg));
        assert_eq!(COREVIEW_DUO.preferred_format(), None);
    }

    #[test]
    fn test_format_support() {
        assert!(COREVIEW_8.supports(PixelFormat::Jpeg));
        assert!(COREVIEW_8.supports(PixelFormat::Rgb565));
        assert!(!COREVIEW_8.supports(PixelFormat::Rgb888));
        assert!(!COREVIEW_DUO.supports(PixelFormat::Jpeg));
    }
}
