//! Full-LCD device handle (CoreView 8 class)
//!
//! Frames are encoded by the codec and delivered chunk by chunk in
//! order. The hardware has no buffer-ready signal, so writes are never
//! pipelined; a failed chunk write abandons the rest of the frame.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;

use crate::capabilities::{Capabilities, COREVIEW_8};
use crate::codec;
use crate::error::DeviceError;
use crate::link::Link;
use crate::manager::DisconnectNotifier;
use crate::transport::HidBackend;
use crate::types::{ConnectionState, DeviceIdentity, DeviceUid, Orientation, PixelFormat};
use crate::DisplayDevice;

pub struct LcdDisplay {
    identity: DeviceIdentity,
    caps: &'static Capabilities,
    link: Link,
    panel: Mutex<PanelSettings>,
}

/// Last values requested by the caller. The wire payloads for these are
/// not recovered yet, so this is the only place they live.
struct PanelSettings {
    brightness: u8,
    orientation: Orientation,
}

impl LcdDisplay {
    /// Registry constructor for the CoreView 8 class.
    pub(crate) fn create(
        identity: DeviceIdentity,
        backend: Arc<dyn HidBackend>,
        notifier: DisconnectNotifier,
    ) -> Result<Arc<dyn DisplayDevice>, DeviceError> {
        Ok(Arc::new(Self {
            link: Link::new(identity.path.clone(), backend, notifier),
            identity,
            caps: &COREVIEW_8,
            panel: Mutex::new(PanelSettings {
                brightness: 100,
                orientation: Orientation::Landscape,
            }),
        }))
    }

    /// Brightness last requested by the caller (percent)
    pub fn brightness(&self) -> u8 {
        self.panel.lock().brightness
    }

    /// Orientation last requested by the caller
    pub fn orientation(&self) -> Orientation {
        self.panel.lock().orientation
    }
}

#[async_trait]
impl DisplayDevice for LcdDisplay {
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

    async fn send_frame(&self, payload: &[u8], format: PixelFormat) -> Result<(), DeviceError> {
        self.link.ensure_connected()?;
        let chunks = codec::encode_frame(self.caps, format, payload)?;

        debug!(
            "Sending {:?} frame of {} bytes in {} chunks to {}",
            format,
            payload.len(),
            chunks.len(),
            self.identity.path
        );
        for chunk in &chunks {
            self.link.write(chunk.as_bytes())?;
            // Yield between chunks: a cancelled caller aborts the rest of
            // the frame here and the handle stays connected.
            tokio::task::yield_now().await;
        }
        Ok(())
    }

    async fn set_brightness(&self, percent: u8) -> Result<(), DeviceError> {
        if !self.caps.has_brightness {
            return Err(DeviceError::NotSupported("brightness"));
        }
        if percent > 100 {
            return Err(DeviceError::InvalidParameter(format!(
                "brightness {percent} out of range (0-100)"
            )));
        }
        self.link.ensure_connected()?;

        // TODO: capture the vendor app's brightness traffic; the opcode
        // is still unknown, so the level is only tracked locally.
        self.panel.lock().brightness = percent;
        debug!("Brightness {}% requested on {}", percent, self.identity.path);
        Ok(())
    }

    async fn set_orientation(&self, orientation: Orientation) -> Result<(), DeviceError> {
        if !self.caps.has_orientation {
            return Err(DeviceError::NotSupported("orientation"));
        }
        self.link.ensure_connected()?;

        // Same situation as brightness: contract implemented, wire
        // payload pending protocol capture.
        self.panel.lock().orientation = orientation;
        debug!(
            "Orientation {:?} requested on {}",
            orientation, self.identity.path
        );
        Ok(())
    }
}
