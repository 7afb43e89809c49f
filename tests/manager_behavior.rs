//! Integration tests for discovery, hot-plug, and device lifecycle,
//! driven by a scripted in-memory HID backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::time::timeout;

use coreview_transport::{
    registry, ConnectionState, DeviceError, DeviceEvent, DeviceManager, DisplayDevice,
    EndpointInfo, HidBackend, HidEndpoint, HotplugEvent, Orientation, PixelFormat,
};

/// Scripted stand-in for the raw HID layer.
#[derive(Default)]
struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    endpoints: Vec<EndpointInfo>,
    /// Successful writes per path, full reports including report id
    writes: HashMap<String, Vec<Vec<u8>>>,
    /// Fail the Nth write (1-based) on a path
    fail_write_at: HashMap<String, usize>,
    hotplug_tx: Option<mpsc::UnboundedSender<HotplugEvent>>,
}

impl MockBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn endpoint(path: &str, vid: u16, pid: u16) -> EndpointInfo {
        EndpointInfo {
            path: path.to_string(),
            vid,
            pid,
            serial: Some(format!("SN-{path}")),
            product: None,
            manufacturer: Some("CoreView".to_string()),
        }
    }

    fn add_endpoint(&self, path: &str, vid: u16, pid: u16) {
        self.state
            .lock()
            .endpoints
            .push(Self::endpoint(path, vid, pid));
    }

    fn remove_endpoint(&self, path: &str) {
        self.state.lock().endpoints.retain(|e| e.path != path);
    }

    fn fail_write(&self, path: &str, nth: usize) {
        self.state.lock().fail_write_at.insert(path.to_string(), nth);
    }

    fn writes(&self, path: &str) -> Vec<Vec<u8>> {
        self.state.lock().writes.get(path).cloned().unwrap_or_default()
    }

    fn push_hotplug(&self, event: HotplugEvent) {
        self.state
            .lock()
            .hotplug_tx
            .as_ref()
            .expect("hotplug not subscribed")
            .send(event)
            .expect("monitor not draining");
    }
}

impl HidBackend for MockBackend {
    fn enumerate(&self, vid: u16, pid: u16) -> Result<Vec<EndpointInfo>, DeviceError> {
        Ok(self
            .state
            .lock()
            .endpoints
            .iter()
            .filter(|e| e.vid == vid && e.pid == pid)
            .cloned()
            .collect())
    }

    fn open(&self, path: &str) -> Result<Box<dyn HidEndpoint>, DeviceError> {
        let state = self.state.lock();
        if !state.endpoints.iter().any(|e| e.path == path) {
            return Err(DeviceError::EndpointNotFound(path.to_string()));
        }
        Ok(Box::new(MockEndpoint {
            path: path.to_string(),
            state: self.state.clone(),
        }))
    }

    fn hotplug_events(&self) -> Result<mpsc::UnboundedReceiver<HotplugEvent>, DeviceError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state.lock().hotplug_tx = Some(tx);
        Ok(rx)
    }
}

struct MockEndpoint {
    path: String,
    state: Arc<Mutex<MockState>>,
}

impl HidEndpoint for MockEndpoint {
    fn write(&self, data: &[u8]) -> Result<usize, DeviceError> {
        let mut state = self.state.lock();
        let done = state.writes.get(&self.path).map_or(0, |w| w.len());
        if state.fail_write_at.get(&self.path) == Some(&(done + 1)) {
            return Err(DeviceError::Hid("simulated write failure".to_string()));
        }
        state
            .writes
            .entry(self.path.clone())
            .or_default()
            .push(data.to_vec());
        Ok(data.len())
    }
}

fn manager_with(backend: &Arc<MockBackend>) -> DeviceManager {
    let backend: Arc<dyn HidBackend> = backend.clone();
    DeviceManager::new(backend)
}

async fn next_event(rx: &mut tokio::sync::broadcast::Receiver<DeviceEvent>) -> DeviceEvent {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("no event within 1s")
        .expect("event channel closed")
}

async fn assert_no_event(rx: &mut tokio::sync::broadcast::Receiver<DeviceEvent>) {
    assert!(
        timeout(Duration::from_millis(200), rx.recv()).await.is_err(),
        "unexpected extra event"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn discovery_tracks_each_endpoint_once() {
    let backend = MockBackend::new();
    backend.add_endpoint("/dev/hidraw0", registry::VENDOR_ID, registry::PID_COREVIEW_8);
    backend.add_endpoint("/dev/hidraw1", registry::VENDOR_ID, registry::PID_COREVIEW_DUO);
    let manager = manager_with(&backend);

    let first = manager.discover_devices().await.unwrap();
    assert_eq!(first.len(), 2);

    // No hardware change: same handles, nothing constructed twice.
    let second = manager.discover_devices().await.unwrap();
    let first_uids: Vec<_> = first.iter().map(|d| d.uid()).collect();
    let second_uids: Vec<_> = second.iter().map(|d| d.uid()).collect();
    assert_eq!(first_uids, second_uids);
    assert_eq!(manager.active_devices().len(), 2);

    for device in &first {
        assert_eq!(manager.get_device(device.uid()).unwrap().uid(), device.uid());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn discovery_uses_driver_name_without_product_string() {
    let backend = MockBackend::new();
    backend.add_endpoint("/dev/hidraw0", registry::VENDOR_ID, registry::PID_COREVIEW_8);
    let manager = manager_with(&backend);

    let devices = manager.discover_devices().await.unwrap();
    assert_eq!(devices[0].identity().name, "CoreView 8");
    assert_eq!(devices[0].identity().serial.as_deref(), Some("SN-/dev/hidraw0"));
}

#[tokio::test(flavor = "multi_thread")]
async fn frame_chunks_written_in_order() {
    let backend = MockBackend::new();
    backend.add_endpoint("/dev/hidraw0", registry::VENDOR_ID, registry::PID_COREVIEW_8);
    let manager = manager_with(&backend);

    let devices = manager.discover_devices().await.unwrap();
    let device = &devices[0];
    device.connect().await.unwrap();
    assert_eq!(device.state(), ConnectionState::Connected);

    let payload: Vec<u8> = (0..1000u16).map(|i| i as u8).collect();
    device.send_frame(&payload, PixelFormat::Jpeg).await.unwrap();

    let writes = backend.writes("/dev/hidraw0");
    assert_eq!(writes.len(), 2);
    // Report id + 512-byte chunk, then report id + the 508-byte remainder
    assert_eq!(writes[0].len(), 513);
    assert_eq!(writes[1].len(), 509);
    assert_eq!(writes[0][0], 0x00);
    assert_eq!(&writes[0][1..5], &[0xDA, 0xDB, 0xDC, 0xDD]);

    let mut logical = Vec::new();
    for report in &writes {
        logical.extend_from_slice(&report[1..]);
    }
    assert_eq!(&logical[20..], &payload[..]);
}

#[tokio::test(flavor = "multi_thread")]
async fn send_frame_requires_connection() {
    let backend = MockBackend::new();
    backend.add_endpoint("/dev/hidraw0", registry::VENDOR_ID, registry::PID_COREVIEW_8);
    let manager = manager_with(&backend);

    let devices = manager.discover_devices().await.unwrap();
    let err = devices[0]
        .send_frame(&[0u8; 64], PixelFormat::Jpeg)
        .await
        .unwrap_err();
    assert!(matches!(err, DeviceError::NotConnected));
    assert!(backend.writes("/dev/hidraw0").is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn unsupported_format_writes_nothing() {
    let backend = MockBackend::new();
    backend.add_endpoint("/dev/hidraw0", registry::VENDOR_ID, registry::PID_COREVIEW_8);
    let manager = manager_with(&backend);

    let devices = manager.discover_devices().await.unwrap();
    devices[0].connect().await.unwrap();

    let err = devices[0]
        .send_frame(&[0u8; 64], PixelFormat::Rgb888)
        .await
        .unwrap_err();
    assert!(matches!(err, DeviceError::UnsupportedFormat(PixelFormat::Rgb888)));
    assert!(backend.writes("/dev/hidraw0").is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn write_failure_fires_exactly_one_disconnect() {
    let backend = MockBackend::new();
    backend.add_endpoint("/dev/hidraw0", registry::VENDOR_ID, registry::PID_COREVIEW_8);
    let manager = manager_with(&backend);
    manager.start();
    let mut events = manager.subscribe();

    let devices = manager.discover_devices().await.unwrap();
    let device = devices[0].clone();
    assert!(matches!(
        next_event(&mut events).await,
        DeviceEvent::Discovered { .. }
    ));

    device.connect().await.unwrap();
    backend.fail_write("/dev/hidraw0", 2);

    // Mid-frame failure: first chunk lands, second aborts the frame.
    let err = device
        .send_frame(&[0u8; 1000], PixelFormat::Jpeg)
        .await
        .unwrap_err();
    assert!(matches!(err, DeviceError::TransportWrite(_)));
    assert_eq!(device.state(), ConnectionState::Disconnected);
    assert_eq!(backend.writes("/dev/hidraw0").len(), 1);

    match next_event(&mut events).await {
        DeviceEvent::Disconnected { uid, .. } => assert_eq!(uid, device.uid()),
        other => panic!("expected Disconnected, got {other:?}"),
    }
    assert!(manager.active_devices().is_empty());
    assert!(manager.get_device(device.uid()).is_none());

    // A second failure on the already-disconnected handle raises nothing.
    let err = device
        .send_frame(&[0u8; 16], PixelFormat::Jpeg)
        .await
        .unwrap_err();
    assert!(matches!(err, DeviceError::NotConnected));
    assert_no_event(&mut events).await;

    manager.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn explicit_disconnect_raises_no_event() {
    let backend = MockBackend::new();
    backend.add_endpoint("/dev/hidraw0", registry::VENDOR_ID, registry::PID_COREVIEW_8);
    let manager = manager_with(&backend);
    manager.start();
    let mut events = manager.subscribe();

    let devices = manager.discover_devices().await.unwrap();
    let device = devices[0].clone();
    assert!(matches!(
        next_event(&mut events).await,
        DeviceEvent::Discovered { .. }
    ));

    device.connect().await.unwrap();
    device.disconnect().await.unwrap();
    assert_eq!(device.state(), ConnectionState::Disconnected);

    // Caller asked for it: the handle stays tracked and nothing fires.
    assert_no_event(&mut events).await;
    assert_eq!(manager.active_devices().len(), 1);

    manager.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn hotplug_arrival_and_removal() {
    let backend = MockBackend::new();
    let manager = manager_with(&backend);
    manager.start();
    let mut events = manager.subscribe();

    // Arrival of an unsupported device is ignored.
    backend.push_hotplug(HotplugEvent::Arrived(MockBackend::endpoint(
        "/dev/hidraw7",
        0x1234,
        0x5678,
    )));

    backend.add_endpoint("/dev/hidraw5", registry::VENDOR_ID, registry::PID_COREVIEW_8);
    backend.push_hotplug(HotplugEvent::Arrived(MockBackend::endpoint(
        "/dev/hidraw5",
        registry::VENDOR_ID,
        registry::PID_COREVIEW_8,
    )));

    let uid = match next_event(&mut events).await {
        DeviceEvent::Discovered { uid, identity } => {
            assert_eq!(identity.path, "/dev/hidraw5");
            uid
        }
        other => panic!("expected Discovered, got {other:?}"),
    };
    assert_eq!(manager.active_devices().len(), 1);

    // Removal of an untracked path is silent; the tracked one retires.
    backend.push_hotplug(HotplugEvent::Removed("/dev/hidraw9".to_string()));
    backend.push_hotplug(HotplugEvent::Removed("/dev/hidraw5".to_string()));

    match next_event(&mut events).await {
        DeviceEvent::Disconnected { uid: gone, .. } => assert_eq!(gone, uid),
        other => panic!("expected Disconnected, got {other:?}"),
    }
    assert!(manager.active_devices().is_empty());
    assert_no_event(&mut events).await;

    manager.stop().await;
}

#[tokio::test(flavor = "multi_thread")]
async fn connect_failure_returns_to_disconnected() {
    let backend = MockBackend::new();
    backend.add_endpoint("/dev/hidraw0", registry::VENDOR_ID, registry::PID_COREVIEW_8);
    let manager = manager_with(&backend);

    let devices = manager.discover_devices().await.unwrap();
    let device = &devices[0];

    // Path went stale between discovery and connect
    backend.remove_endpoint("/dev/hidraw0");
    let err = device.connect().await.unwrap_err();
    assert!(matches!(err, DeviceError::ConnectFailed(_)));
    assert_eq!(device.state(), ConnectionState::Disconnected);

    // Endpoint is back: connect succeeds and is idempotent
    backend.add_endpoint("/dev/hidraw0", registry::VENDOR_ID, registry::PID_COREVIEW_8);
    device.connect().await.unwrap();
    device.connect().await.unwrap();
    assert_eq!(device.state(), ConnectionState::Connected);
}

#[tokio::test(flavor = "multi_thread")]
async fn segment_device_takes_readings_not_frames() {
    let backend = MockBackend::new();
    backend.add_endpoint("/dev/hidraw1", registry::VENDOR_ID, registry::PID_COREVIEW_DUO);
    let manager = manager_with(&backend);

    let devices = manager.discover_devices().await.unwrap();
    let device = &devices[0];
    device.connect().await.unwrap();

    device.send_readings(42, 150).await.unwrap();
    let writes = backend.writes("/dev/hidraw1");
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0], vec![0x00, 0xDC, 0xDD, 42, 99, 0, 0, 0, 0]);

    let err = device
        .send_frame(&[0u8; 8], PixelFormat::Jpeg)
        .await
        .unwrap_err();
    assert!(matches!(err, DeviceError::NotSupported(_)));

    let err = device.set_brightness(50).await.unwrap_err();
    assert!(matches!(err, DeviceError::NotSupported(_)));
    let err = device.set_orientation(Orientation::Portrait).await.unwrap_err();
    assert!(matches!(err, DeviceError::NotSupported(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn lcd_readings_rejected() {
    let backend = MockBackend::new();
    backend.add_endpoint("/dev/hidraw0", registry::VENDOR_ID, registry::PID_COREVIEW_8);
    let manager = manager_with(&backend);

    let devices = manager.discover_devices().await.unwrap();
    devices[0].connect().await.unwrap();
    let err = devices[0].send_readings(1, 2).await.unwrap_err();
    assert!(matches!(err, DeviceError::NotSupported(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn brightness_and_orientation_gating() {
    let backend = MockBackend::new();
    backend.add_endpoint("/dev/hidraw0", registry::VENDOR_ID, registry::PID_COREVIEW_8);
    let manager = manager_with(&backend);

    let devices = manager.discover_devices().await.unwrap();
    let device = &devices[0];

    // Valid request on a disconnected handle
    let err = device.set_brightness(50).await.unwrap_err();
    assert!(matches!(err, DeviceError::NotConnected));
    let err = device.set_orientation(Orientation::Portrait).await.unwrap_err();
    assert!(matches!(err, DeviceError::NotConnected));

    device.connect().await.unwrap();
    let err = device.set_brightness(101).await.unwrap_err();
    assert!(matches!(err, DeviceError::InvalidParameter(_)));

    device.set_brightness(80).await.unwrap();
    device.set_orientation(Orientation::PortraitFlipped).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn blank_frame_is_a_single_header_chunk() {
    let backend = MockBackend::new();
    backend.add_endpoint("/dev/hidraw0", registry::VENDOR_ID, registry::PID_COREVIEW_8);
    let manager = manager_with(&backend);

    let devices = manager.discover_devices().await.unwrap();
    devices[0].connect().await.unwrap();
    devices[0].send_frame(&[], PixelFormat::Jpeg).await.unwrap();

    let writes = backend.writes("/dev/hidraw0");
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].len(), 21); // report id + bare header
}
