//! Common types for the device layer

use serde::Serialize;

/// Pixel format of an encoded frame payload
///
/// Selects the header's compression code and how the payload length is
/// interpreted by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PixelFormat {
    /// Raw 16-bit RGB565 pixel stream
    Rgb565,
    /// Raw 24-bit RGB888 pixel stream
    Rgb888,
    /// JPEG-encoded frame
    Jpeg,
}

/// Panel orientation, one of the four fixed rotations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Orientation {
    Landscape,
    Portrait,
    LandscapeFlipped,
    PortraitFlipped,
}

/// Connection lifecycle of a device handle
///
/// `Connecting` is transient while a connect is in flight; a failed
/// connect returns to `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Caller-visible unique id for a tracked device handle
///
/// Assigned once by the manager when a handle is constructed; never
/// reused for a different physical endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DeviceUid(pub u32);

/// Device identification, built once at discovery time
#[derive(Debug, Clone, Serialize)]
pub struct DeviceIdentity {
    /// USB Vendor ID
    pub vid: u16,
    /// USB Product ID
    pub pid: u16,
    /// Product name (from the descriptor, or the driver's diagnostic name)
    pub name: String,
    /// Manufacturer string if available
    pub manufacturer: Option<String>,
    /// Platform HID path used to open the endpoint
    pub path: String,
    /// Serial number if available
    pub serial: Option<String>,
}

/// One outbound transport unit: a report id byte followed by up to
/// `max_chunk` payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportChunk {
    bytes: Vec<u8>,
}

impl TransportChunk {
    pub(crate) fn new(report_id: u8, payload: &[u8]) -> Self {
        let mut bytes = Vec::with_capacity(1 + payload.len());
        bytes.push(report_id);
        bytes.extend_from_slice(payload);
        Self { bytes }
    }

    /// Full report as written to the transport, report id included
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Payload bytes without the leading report id
    pub fn payload(&self) -> &[u8] {
        &self.bytes[1..]
    }
}

/// Raw HID endpoint as reported by the transport backend
#[derive(Debug, Clone)]
pub struct EndpointInfo {
    /// Platform path used to open the endpoint
    pub path: String,
    pub vid: u16,
    pub pid: u16,
    pub serial: Option<String>,
    pub product: Option<String>,
    pub manufacturer: Option<String>,
}

/// Hot-plug notifications pushed by the transport backend
#[derive(Debug, Clone)]
pub enum HotplugEvent {
    /// A matching endpoint appeared
    Arrived(EndpointInfo),
    /// The endpoint at this path went away
    Removed(String),
}

/// Device lifecycle events raised by the manager
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// A device handle was constructed and is now tracked
    Discovered {
        uid: DeviceUid,
        identity: DeviceIdentity,
    },
    /// A tracked device went away (hot-plug removal or transport failure)
    Disconnected {
        uid: DeviceUid,
        identity: DeviceIdentity,
    },
}
