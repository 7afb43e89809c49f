//! Segment-display device handle (CoreView Duo class)
//!
//! The Duo has no pixel surface: one fixed-size report per update
//! carries the two readout values, no header and no fragmentation. It
//! rejects the frame path and exposes the narrower readings operation
//! instead.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::capabilities::{Capabilities, COREVIEW_DUO};
use crate::codec;
use crate::error::DeviceError;
use crate::link::Link;
use crate::manager::DisconnectNotifier;
use crate::transport::HidBackend;
use crate::types::{ConnectionState, DeviceIdentity, DeviceUid, Orientation, PixelFormat};
use crate::DisplayDevice;

pub struct SegmentDisplay {
    identity: DeviceIdentity,
    caps: &'static Capabilities,
    link: Link,
}

impl SegmentDisplay {
    /// Registry constructor for the CoreView Duo class.
    pub(crate) fn create(
        identity: DeviceIdentity,
        backend: Arc<dyn HidBackend>,
        notifier: DisconnectNotifier,
    ) -> Result<Arc<dyn DisplayDevice>, DeviceError> {
        Ok(Arc::new(Self {
            link: Link::new(identity.path.clone(), backend, notifier),
            identity,
            caps: &COREVIEW_DUO,
        }))
    }
}

#[async_trait]
impl DisplayDevice for SegmentDisplay {
    fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    fn capabilities(&self) -> &'static Capabilities {
        self.caps
    }

    fn uid(&self) -> DeviceUid {
        self.link.notifier().uid()
    }

    fn state(&self) -> ConnectionState {
        self.link.state()
    }

    async fn connect(&self) -> Result<(), DeviceError> {
        self.link.connect()
    }

    async fn disconnect(&self) -> Result<(), DeviceError> {
        self.link.disconnect();
        Ok(())
    }

    async fn send_frame(&self, _payload: &[u8], _format: PixelFormat) -> Result<(), DeviceError> {
        Err(DeviceError::NotSupported("pixel frames"))
    }

    async fn send_readings(&self, left: u8, right: u8) -> Result<(), DeviceError> {
        self.link.ensure_connected()?;
        let report = codec::encode_readings(left, right);
        self.link.write(&report)?;
        debug!(
            "Readings {}/{} sent to {}",
            left.min(crate::protocol::segment::MAX_READING),
            right.min(crate::protocol::segment::MAX_READING),
            self.identity.path
        );
        Ok(())
    }

    async fn set_brightness(&self, _percent: u8) -> Result<(), DeviceError> {
        Err(DeviceError::NotSupported("brightness"))
    }

    async fn set_orientation(&self, _orientation: Orientation) -> Result<(), DeviceError> {
        Err(DeviceError::NotSupported("orientation"))
    }
}
