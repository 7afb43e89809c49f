//! Raw HID transport boundary
//!
//! The device layer reaches hardware only through these traits, so the
//! manager and handles can be driven by a scripted backend in tests. The
//! production backend wraps hidapi.

use std::ffi::CString;

use hidapi::HidApi;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::DeviceError;
use crate::types::{EndpointInfo, HotplugEvent};

/// Write access to one opened HID endpoint.
///
/// The endpoint is closed when the value is dropped.
pub trait HidEndpoint: Send + Sync {
    /// Write one report, report id included. Returns the number of bytes
    /// written.
    fn write(&self, data: &[u8]) -> Result<usize, DeviceError>;
}

/// Raw HID primitive consumed by the device layer.
pub trait HidBackend: Send + Sync {
    /// Enumerate endpoints matching a vendor/product pair.
    fn enumerate(&self, vid: u16, pid: u16) -> Result<Vec<EndpointInfo>, DeviceError>;

    /// Open the endpoint at a platform path.
    fn open(&self, path: &str) -> Result<Box<dyn HidEndpoint>, DeviceError>;

    /// Subscribe to hot-plug notifications.
    ///
    /// Events are pushed from the backend's own notification thread; the
    /// receiver is drained on the subscriber's task so that thread never
    /// touches subscriber state.
    fn hotplug_events(&self) -> Result<mpsc::UnboundedReceiver<HotplugEvent>, DeviceError>;
}

/// Production backend over hidapi
#[derive(Default)]
pub struct HidApiBackend;

impl HidApiBackend {
    pub fn new() -> Self {
        Self
    }
}

impl HidBackend for HidApiBackend {
    fn enumerate(&self, vid: u16, pid: u16) -> Result<Vec<EndpointInfo>, DeviceError> {
        let api = HidApi::new().map_err(DeviceError::from)?;

        let endpoints: Vec<EndpointInfo> = api
            .device_list()
            .filter(|d| d.vendor_id() == vid && d.product_id() == pid)
            .map(|d| EndpointInfo {
                path: d.path().to_string_lossy().to_string(),
                vid,
                pid,
                serial: d.serial_number().map(|s| s.to_string()),
                product: d.product_string().map(|s| s.to_string()),
                manufacturer: d.manufacturer_string().map(|s| s.to_string()),
            })
            .collect();

        debug!(
            "Enumerated {} endpoints for {:04X}:{:04X}",
            endpoints.len(),
            vid,
            pid
        );
        Ok(endpoints)
    }

    fn open(&self, path: &str) -> Result<Box<dyn HidEndpoint>, DeviceError> {
        let api = HidApi::new().map_err(DeviceError::from)?;
        let c_path = CString::new(path)
            .map_err(|_| DeviceError::EndpointNotFound(path.to_string()))?;
        let device = api.open_path(&c_path).map_err(DeviceError::from)?;
        debug!("Opened HID endpoint at {}", path);
        Ok(Box::new(HidApiEndpoint {
            device: Mutex::new(device),
        }))
    }

    fn hotplug_events(&self) -> Result<mpsc::UnboundedReceiver<HotplugEvent>, DeviceError> {
        #[cfg(all(feature = "hotplug", target_os = "linux"))]
        {
            crate::hotplug::spawn_watcher()
        }
        #[cfg(not(all(feature = "hotplug", target_os = "linux")))]
        {
            Err(DeviceError::HotplugUnavailable(
                "built without hot-plug support",
            ))
        }
    }
}

/// One opened hidapi device
struct HidApiEndpoint {
    device: Mutex<hidapi::HidDevice>,
}

impl HidEndpoint for HidApiEndpoint {
    fn write(&self, data: &[u8]) -> Result<usize, DeviceError> {
        let device = self.device.lock();
        let written = device.write(data).map_err(DeviceError::from)?;
        Ok(written)
    }
}
