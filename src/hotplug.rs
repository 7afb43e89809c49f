//! udev-based hot-plug watcher
//!
//! Watches the hidraw subsystem and pushes arrival/removal events for
//! registered hardware into an mpsc queue. The device manager drains the
//! queue on its own task; the udev notification path never touches the
//! active-device table.

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_udev::{AsyncMonitorSocket, Device, EventType, MonitorBuilder};
use tracing::{debug, warn};

use crate::error::DeviceError;
use crate::registry;
use crate::types::{EndpointInfo, HotplugEvent};

/// Start the udev watcher and return the event queue.
///
/// The watcher task ends when the receiver is dropped.
pub(crate) fn spawn_watcher() -> Result<mpsc::UnboundedReceiver<HotplugEvent>, DeviceError> {
    let socket = MonitorBuilder::new()
        .and_then(|b| b.match_subsystem("hidraw"))
        .and_then(|b| b.listen())
        .map_err(|e| DeviceError::Internal(format!("udev monitor: {e}")))?;
    let monitor = AsyncMonitorSocket::new(socket)
        .map_err(|e| DeviceError::Internal(format!("udev monitor: {e}")))?;

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(watch_loop(monitor, tx));
    Ok(rx)
}

async fn watch_loop(mut monitor: AsyncMonitorSocket, tx: mpsc::UnboundedSender<HotplugEvent>) {
    debug!("udev hot-plug watcher started");
    while let Some(event) = monitor.next().await {
        let event = match event {
            Ok(event) => event,
            Err(e) => {
                warn!("udev event error: {}", e);
                continue;
            }
        };

        let Some(path) = event.devnode().map(|p| p.to_string_lossy().to_string()) else {
            continue;
        };

        let forwarded = match event.event_type() {
            EventType::Add => match endpoint_from_device(&event.device(), path) {
                Some(info) => {
                    debug!(
                        "Hot-plug arrival: {:04X}:{:04X} at {}",
                        info.vid, info.pid, info.path
                    );
                    tx.send(HotplugEvent::Arrived(info))
                }
                None => continue,
            },
            EventType::Remove => {
                debug!("Hot-plug removal at {}", path);
                tx.send(HotplugEvent::Removed(path))
            }
            _ => continue,
        };

        if forwarded.is_err() {
            // Receiver gone; the manager stopped monitoring.
            break;
        }
    }
    debug!("udev hot-plug watcher exiting");
}

/// Build endpoint info for a hidraw device whose USB parent is a
/// registered vendor/product pair. Returns `None` for anything else.
fn endpoint_from_device(device: &Device, path: String) -> Option<EndpointInfo> {
    let parent = device
        .parent_with_subsystem_devtype("usb", "usb_device")
        .ok()
        .flatten()?;

    let vid = hex_attribute(&parent, "idVendor")?;
    let pid = hex_attribute(&parent, "idProduct")?;
    if !registry::is_supported(vid, pid) {
        return None;
    }

    Some(EndpointInfo {
        path,
        vid,
        pid,
        serial: string_attribute(&parent, "serial"),
        product: string_attribute(&parent, "product"),
        manufacturer: string_attribute(&parent, "manufacturer"),
    })
}

fn hex_attribute(device: &Device, name: &str) -> Option<u16> {
    let value = device.attribute_value(name)?;
    u16::from_str_radix(value.to_str()?.trim(), 16).ok()
}

fn string_attribute(device: &Device, name: &str) -> Option<String> {
    device
        .attribute_value(name)
        .map(|v| v.to_string_lossy().trim().to_string())
}
