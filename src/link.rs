//! Shared connection state machine for device handles
//!
//! Both hardware variants own one `Link`: the open transport endpoint,
//! the connection state, and the manager-owned disconnect queue. A
//! failed write retires the connection and notifies the manager exactly
//! once; the explicit disconnect path stays silent.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::DeviceError;
use crate::manager::DisconnectNotifier;
use crate::transport::{HidBackend, HidEndpoint};
use crate::types::ConnectionState;

pub(crate) struct Link {
    path: String,
    backend: Arc<dyn HidBackend>,
    notifier: DisconnectNotifier,
    inner: Mutex<Inner>,
}

struct Inner {
    state: ConnectionState,
    endpoint: Option<Box<dyn HidEndpoint>>,
}

impl Link {
    pub(crate) fn new(
        path: String,
        backend: Arc<dyn HidBackend>,
        notifier: DisconnectNotifier,
    ) -> Self {
        Self {
            path,
            backend,
            notifier,
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                endpoint: None,
            }),
        }
    }

    pub(crate) fn notifier(&self) -> &DisconnectNotifier {
        &self.notifier
    }

    pub(crate) fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Open the transport at the handle's path.
    ///
    /// Idempotent while connected; a failed open returns the handle to
    /// `Disconnected` with the wrapped transport error.
    pub(crate) fn connect(&self) -> Result<(), DeviceError> {
        {
            let mut inner = self.inner.lock();
            match inner.state {
                ConnectionState::Connected => return Ok(()),
                ConnectionState::Connecting => {
                    return Err(DeviceError::ConnectFailed(
                        "connect already in progress".to_string(),
                    ))
                }
                ConnectionState::Disconnected => inner.state = ConnectionState::Connecting,
            }
        }

        match self.backend.open(&self.path) {
            Ok(endpoint) => {
                let mut inner = self.inner.lock();
                inner.endpoint = Some(endpoint);
                inner.state = ConnectionState::Connected;
                debug!("Connected to {}", self.path);
                Ok(())
            }
            Err(e) => {
                self.inner.lock().state = ConnectionState::Disconnected;
                Err(DeviceError::ConnectFailed(e.to_string()))
            }
        }
    }

    /// Close the transport. Requested by the caller, so the disconnect
    /// queue is not notified. Idempotent.
    pub(crate) fn disconnect(&self) {
        let mut inner = self.inner.lock();
        if inner.state != ConnectionState::Disconnected {
            debug!("Disconnected from {}", self.path);
        }
        inner.endpoint = None;
        inner.state = ConnectionState::Disconnected;
    }

    /// Write one report to the transport.
    ///
    /// A failed write retires the connection and pushes one disconnect
    /// notification; later writes fail `NotConnected` without a second
    /// notification.
    pub(crate) fn write(&self, data: &[u8]) -> Result<(), DeviceError> {
        let mut inner = self.inner.lock();
        if inner.state != ConnectionState::Connected {
            return Err(DeviceError::NotConnected);
        }
        let endpoint = inner.endpoint.as_ref().ok_or(DeviceError::NotConnected)?;

        match endpoint.write(data) {
            Ok(_) => Ok(()),
            Err(e) => {
                inner.endpoint = None;
                inner.state = ConnectionState::Disconnected;
                drop(inner);
                warn!("Write failed on {}: {}", self.path, e);
                self.notifier.notify();
                Err(DeviceError::TransportWrite(e.to_string()))
            }
        }
    }

    /// Guard shared by operations that touch hardware state: fail fast
    /// when the handle is not connected.
    pub(crate) fn ensure_connected(&self) -> Result<(), DeviceError> {
        if self.state() != ConnectionState::Connected {
            return Err(DeviceError::NotConnected);
        }
        Ok(())
    }
}
