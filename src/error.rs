//! Device error types

use thiserror::Error;

use crate::types::PixelFormat;

/// Errors that can occur in the device communication layer
#[derive(Error, Debug)]
pub enum DeviceError {
    // Caller-recoverable errors
    #[error("Pixel format {0:?} not supported by this device")]
    UnsupportedFormat(PixelFormat),

    #[error("Device not connected")]
    NotConnected,

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // Connection-affecting errors (disconnect triggers)
    #[error("Connect failed: {0}")]
    ConnectFailed(String),

    #[error("Transport write failed: {0}")]
    TransportWrite(String),

    // Permanent per-class errors
    #[error("Feature not supported on this device: {0}")]
    NotSupported(&'static str),

    // Discovery errors
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    // HID-specific errors
    #[error("HID error: {0}")]
    Hid(String),

    #[error("HID permission denied: {0}")]
    HidPermissionDenied(String),

    // Hot-plug
    #[error("Hot-plug monitoring unavailable: {0}")]
    HotplugUnavailable(&'static str),

    // Generic
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<hidapi::HidError> for DeviceError {
    fn from(e: hidapi::HidError) -> Self {
        let msg = e.to_string();
        if msg.contains("Permission denied") || msg.contains("EPERM") {
            DeviceError::HidPermissionDenied(msg)
        } else {
            DeviceError::Hid(msg)
        }
    }
}
