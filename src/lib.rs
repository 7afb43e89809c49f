//! Device communication layer for CoreView USB HID displays
//!
//! CoreView panels speak a vendor protocol recovered by USB capture:
//! every frame is prefixed with a fixed 20-byte header and fragmented
//! into report-sized chunks. This crate provides:
//!
//! - discovery and hot-plug tracking of supported hardware
//! - per-class capability descriptions
//! - the pure wire codec (header build + fragmentation)
//! - device handles for both hardware variants behind one trait
//!
//! Rendering, IPC, and telemetry live with the daemon; this crate stops
//! at bytes on the wire.

pub mod capabilities;
pub mod codec;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod types;

mod lcd;
mod link;
mod manager;
mod segment;
mod transport;

#[cfg(all(feature = "hotplug", target_os = "linux"))]
mod hotplug;

pub use capabilities::{Capabilities, COREVIEW_8, COREVIEW_DUO};
pub use error::DeviceError;
pub use lcd::LcdDisplay;
pub use manager::{DeviceManager, DisconnectNotifier};
pub use segment::SegmentDisplay;
pub use transport::{HidApiBackend, HidBackend, HidEndpoint};
pub use types::{
    ConnectionState, DeviceEvent, DeviceIdentity, DeviceUid, EndpointInfo, HotplugEvent,
    Orientation, PixelFormat, TransportChunk,
};

use std::sync::Arc;

use async_trait::async_trait;

/// One connected (or connectable) display device.
///
/// Implemented by both hardware variants; the registry hands out
/// constructors so the manager never names a concrete type.
///
/// Per-device I/O is asynchronous but not reentrant: callers keep at
/// most one `send_frame`/`send_readings` in flight per handle. The
/// render pipeline already serializes frame delivery per device, so the
/// constraint is documented rather than enforced with a queue.
#[async_trait]
pub trait DisplayDevice: Send + Sync {
    /// Identity captured at discovery time
    fn identity(&self) -> &DeviceIdentity;

    /// Static capabilities of this device class
    fn capabilities(&self) -> &'static Capabilities;

    /// Manager-assigned unique id
    fn uid(&self) -> DeviceUid;

    /// Current connection state
    fn state(&self) -> ConnectionState;

    /// Open the transport at the identity's path.
    ///
    /// Idempotent while connected. Fails with `ConnectFailed` on a stale
    /// path or access denial and returns the handle to `Disconnected`.
    async fn connect(&self) -> Result<(), DeviceError>;

    /// Close the transport.
    ///
    /// A caller-requested disconnect; never reported through the
    /// manager's disconnect path.
    async fn disconnect(&self) -> Result<(), DeviceError>;

    /// Encode one frame and write its chunks to the transport in order,
    /// each write completing before the next starts.
    ///
    /// The payload is borrowed for the duration of the call and never
    /// buffered. A write failure abandons the remaining chunks of this
    /// frame (the hardware has no transactional frame semantics) and
    /// retires the connection.
    async fn send_frame(&self, payload: &[u8], format: PixelFormat) -> Result<(), DeviceError>;

    /// Push two readout values to a segment display.
    ///
    /// Only the segment variant implements this; everything else reports
    /// `NotSupported`.
    async fn send_readings(&self, left: u8, right: u8) -> Result<(), DeviceError> {
        let _ = (left, right);
        Err(DeviceError::NotSupported("readings"))
    }

    /// Set panel brightness in percent (0-100).
    ///
    /// Fire-and-forget; the hardware sends no acknowledgement.
    async fn set_brightness(&self, percent: u8) -> Result<(), DeviceError>;

    /// Rotate the panel to one of the four fixed orientations.
    async fn set_orientation(&self, orientation: Orientation) -> Result<(), DeviceError>;
}

/// Type alias for a shared device handle
pub type BoxedDevice = Arc<dyn DisplayDevice>;
