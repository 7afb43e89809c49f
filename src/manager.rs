//! Device manager - discovery sweeps, hot-plug tracking, active handle set
//!
//! Owns the table of tracked device handles, keyed by transport path.
//! Discovery sweeps and hot-plug arrivals construct handles through the
//! driver registry; hot-plug removals and handle-reported transport
//! failures retire them. Both removal trigger sources funnel through the
//! same table removal, so `DeviceEvent::Disconnected` fires exactly once
//! per retirement.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::DeviceError;
use crate::registry::{self, Driver};
use crate::transport::HidBackend;
use crate::types::{DeviceEvent, DeviceIdentity, DeviceUid, EndpointInfo, HotplugEvent};
use crate::DisplayDevice;

/// Capacity of the device event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Owned channel a handle uses to report an unsolicited disconnect.
///
/// Handed to each device constructor by the manager; one queue drained
/// by the manager task replaces a per-handle multicast event, so there
/// is nothing to unsubscribe on removal.
#[derive(Clone)]
pub struct DisconnectNotifier {
    uid: DeviceUid,
    tx: mpsc::UnboundedSender<DeviceUid>,
}

impl DisconnectNotifier {
    pub(crate) fn new(uid: DeviceUid, tx: mpsc::UnboundedSender<DeviceUid>) -> Self {
        Self { uid, tx }
    }

    /// Manager-assigned unique id of the owning handle
    pub fn uid(&self) -> DeviceUid {
        self.uid
    }

    /// Report an unsolicited transport failure on the owning handle.
    pub fn notify(&self) {
        // The manager may already be gone during shutdown.
        let _ = self.tx.send(self.uid);
    }
}

struct Entry {
    uid: DeviceUid,
    device: Arc<dyn DisplayDevice>,
}

struct Shared {
    backend: Arc<dyn HidBackend>,
    /// Immutable driver table, injected at construction
    drivers: &'static [Driver],
    /// Active handles keyed by transport path. The single lock
    /// serializes every mutation; readers take snapshots.
    devices: Mutex<HashMap<String, Entry>>,
    event_tx: broadcast::Sender<DeviceEvent>,
    disconnect_tx: mpsc::UnboundedSender<DeviceUid>,
    /// Held by the monitor task while it runs; surviving a stop/start
    /// cycle keeps queued handle notifications deliverable.
    disconnect_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<DeviceUid>>,
    next_uid: AtomicU32,
}

/// Discovery and lifecycle tracking for all connected CoreView devices
pub struct DeviceManager {
    shared: Arc<Shared>,
    monitor: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceManager {
    /// Create a manager over the built-in driver table.
    pub fn new(backend: Arc<dyn HidBackend>) -> Self {
        Self::with_drivers(backend, registry::DRIVERS)
    }

    /// Create a manager over an explicit driver table.
    pub fn with_drivers(backend: Arc<dyn HidBackend>, drivers: &'static [Driver]) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (disconnect_tx, disconnect_rx) = mpsc::unbounded_channel();
        Self {
            shared: Arc::new(Shared {
                backend,
                drivers,
                devices: Mutex::new(HashMap::new()),
                event_tx,
                disconnect_tx,
                disconnect_rx: tokio::sync::Mutex::new(disconnect_rx),
                next_uid: AtomicU32::new(1),
            }),
            monitor: Mutex::new(None),
        }
    }

    /// Sweep every registered vendor/product pair for endpoints.
    ///
    /// Endpoints already tracked by path are returned as-is, never
    /// duplicated. A construction failure for one endpoint is logged and
    /// skipped; discovery of the rest continues.
    pub async fn discover_devices(&self) -> Result<Vec<Arc<dyn DisplayDevice>>, DeviceError> {
        let mut found = Vec::new();
        for driver in self.shared.drivers {
            let endpoints = match self.shared.backend.enumerate(driver.vid, driver.pid) {
                Ok(endpoints) => endpoints,
                Err(e) => {
                    warn!(
                        "Enumeration failed for {:04X}:{:04X} ({}): {}",
                        driver.vid, driver.pid, driver.name, e
                    );
                    continue;
                }
            };
            for endpoint in endpoints {
                match self.shared.track_endpoint(driver, endpoint) {
                    Ok(device) => found.push(device),
                    Err(e) => warn!("Skipping {} endpoint: {}", driver.name, e),
                }
            }
        }
        info!("Discovery found {} devices", found.len());
        Ok(found)
    }

    /// Snapshot of all tracked handles
    pub fn active_devices(&self) -> Vec<Arc<dyn DisplayDevice>> {
        self.shared
            .devices
            .lock()
            .values()
            .map(|entry| entry.device.clone())
            .collect()
    }

    /// Look up a tracked handle by its unique id. Linear scan; the
    /// active set is small.
    pub fn get_device(&self, uid: DeviceUid) -> Option<Arc<dyn DisplayDevice>> {
        self.shared
            .devices
            .lock()
            .values()
            .find(|entry| entry.uid == uid)
            .map(|entry| entry.device.clone())
    }

    /// Subscribe to device lifecycle events.
    pub fn subscribe(&self) -> broadcast::Receiver<DeviceEvent> {
        self.shared.event_tx.subscribe()
    }

    /// Start the monitor task: drains hot-plug notifications from the
    /// backend and disconnect reports from tracked handles. Idempotent
    /// while running.
    ///
    /// Without backend hot-plug support the task still runs to retire
    /// handles that report transport failures.
    pub fn start(&self) {
        let mut monitor = self.monitor.lock();
        if monitor.is_some() {
            return;
        }

        let hotplug_rx = match self.shared.backend.hotplug_events() {
            Ok(rx) => Some(rx),
            Err(e) => {
                warn!("Hot-plug monitoring unavailable: {}", e);
                None
            }
        };

        let shared = self.shared.clone();
        *monitor = Some(tokio::spawn(monitor_loop(shared, hotplug_rx)));
        debug!("Monitor task started");
    }

    /// Stop the monitor task. Tolerates being called mid-sweep; queued
    /// handle notifications are delivered after the next `start`.
    pub async fn stop(&self) {
        let handle = self.monitor.lock().take();
        if let Some(handle) = handle {
            handle.abort();
            let _ = handle.await;
            debug!("Monitor task stopped");
        }
    }
}

impl Shared {
    /// Construct and track a handle for an endpoint, or return the
    /// handle already tracked at its path.
    fn track_endpoint(
        &self,
        driver: &'static Driver,
        endpoint: EndpointInfo,
    ) -> Result<Arc<dyn DisplayDevice>, DeviceError> {
        if let Some(entry) = self.devices.lock().get(&endpoint.path) {
            return Ok(entry.device.clone());
        }

        let uid = DeviceUid(self.next_uid.fetch_add(1, Ordering::Relaxed));
        let identity = DeviceIdentity {
            vid: endpoint.vid,
            pid: endpoint.pid,
            name: endpoint
                .product
                .clone()
                .unwrap_or_else(|| driver.name.to_string()),
            manufacturer: endpoint.manufacturer.clone(),
            path: endpoint.path.clone(),
            serial: endpoint.serial.clone(),
        };
        let notifier = DisconnectNotifier::new(uid, self.disconnect_tx.clone());
        let device = (driver.ctor)(identity.clone(), self.backend.clone(), notifier)?;

        {
            let mut devices = self.devices.lock();
            // A hot-plug arrival can race a discovery sweep for the same
            // endpoint; whoever inserted first wins.
            if let Some(entry) = devices.get(&endpoint.path) {
                return Ok(entry.device.clone());
            }
            devices.insert(
                endpoint.path.clone(),
                Entry {
                    uid,
                    device: device.clone(),
                },
            );
        }

        info!(
            "Tracking {} ({:04X}:{:04X}) as {:?} at {}",
            identity.name, identity.vid, identity.pid, uid, identity.path
        );
        let _ = self.event_tx.send(DeviceEvent::Discovered { uid, identity });
        Ok(device)
    }

    async fn handle_arrival(&self, endpoint: EndpointInfo) {
        let Some(driver) = self
            .drivers
            .iter()
            .find(|d| d.vid == endpoint.vid && d.pid == endpoint.pid)
        else {
            debug!(
                "Ignoring unsupported device {:04X}:{:04X} at {}",
                endpoint.vid, endpoint.pid, endpoint.path
            );
            return;
        };
        if let Err(e) = self.track_endpoint(driver, endpoint) {
            warn!("Failed to track arrived {} device: {}", driver.name, e);
        }
    }

    async fn retire_path(&self, path: &str) {
        let entry = self.devices.lock().remove(path);
        if let Some(entry) = entry {
            self.finish_retire(entry).await;
        }
    }

    async fn retire_uid(&self, uid: DeviceUid) {
        let entry = {
            let mut devices = self.devices.lock();
            let path = devices
                .iter()
                .find(|(_, entry)| entry.uid == uid)
                .map(|(path, _)| path.clone());
            path.and_then(|path| devices.remove(&path))
        };
        if let Some(entry) = entry {
            self.finish_retire(entry).await;
        }
    }

    /// Complete a retirement after the table removal that claimed it:
    /// close the transport and raise the event. Runs at most once per
    /// entry because only one caller can remove it.
    async fn finish_retire(&self, entry: Entry) {
        let _ = entry.device.disconnect().await;
        let identity = entry.device.identity().clone();
        info!("Retired {:?} at {}", entry.uid, identity.path);
        let _ = self.event_tx.send(DeviceEvent::Disconnected {
            uid: entry.uid,
            identity,
        });
    }
}

async fn monitor_loop(
    shared: Arc<Shared>,
    mut hotplug_rx: Option<mpsc::UnboundedReceiver<HotplugEvent>>,
) {
    let mut disconnect_rx = shared.disconnect_rx.lock().await;
    loop {
        tokio::select! {
            event = next_hotplug(&mut hotplug_rx) => match event {
                Some(HotplugEvent::Arrived(endpoint)) => shared.handle_arrival(endpoint).await,
                Some(HotplugEvent::Removed(path)) => shared.retire_path(&path).await,
                None => {
                    warn!("Hot-plug stream ended");
                    hotplug_rx = None;
                }
            },
            uid = disconnect_rx.recv() => match uid {
                Some(uid) => shared.retire_uid(uid).await,
                // Unreachable while the shared state holds a sender.
                None => break,
            },
        }
    }
}

/// Receive the next hot-plug event, or park forever once the stream is
/// gone (handle disconnects still drain).
async fn next_hotplug(
    rx: &mut Option<mpsc::UnboundedReceiver<HotplugEvent>>,
) -> Option<HotplugEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
