//! Driver registry - device class lookup by VID/PID
//!
//! A static, append-only table mapping each supported vendor/product
//! pair to its capabilities and handle constructor. Populated once at
//! compile time and injected into the device manager; never mutated at
//! runtime.

use std::sync::Arc;

use crate::capabilities::{self, Capabilities};
use crate::error::DeviceError;
use crate::lcd::LcdDisplay;
use crate::manager::DisconnectNotifier;
use crate::segment::SegmentDisplay;
use crate::transport::HidBackend;
use crate::types::DeviceIdentity;
use crate::DisplayDevice;

/// CoreView vendor ID
pub const VENDOR_ID: u16 = 0x3633;

/// CoreView 8 (8.8" LCD bar)
pub const PID_COREVIEW_8: u16 = 0x5821;
/// CoreView Duo (dual segment readout)
pub const PID_COREVIEW_DUO: u16 = 0x5830;

/// Constructor for one device class
pub type DeviceCtor = fn(
    DeviceIdentity,
    Arc<dyn HidBackend>,
    DisconnectNotifier,
) -> Result<Arc<dyn DisplayDevice>, DeviceError>;

/// One registered device class
pub struct Driver {
    pub vid: u16,
    pub pid: u16,
    /// Diagnostic name, used in logs and when the descriptor carries no
    /// product string
    pub name: &'static str,
    pub caps: &'static Capabilities,
    pub ctor: DeviceCtor,
}

/// All supported device classes.
///
/// Append-only; a duplicate (vid, pid) key is a configuration error
/// caught by the table test below, never resolved at runtime.
pub static DRIVERS: &[Driver] = &[
    Driver {
        vid: VENDOR_ID,
        pid: PID_COREVIEW_8,
        name: "CoreView 8",
        caps: &capabilities::COREVIEW_8,
        ctor: LcdDisplay::create,
    },
    Driver {
        vid: VENDOR_ID,
        pid: PID_COREVIEW_DUO,
        name: "CoreView Duo",
        caps: &capabilities::COREVIEW_DUO,
        ctor: SegmentDisplay::create,
    },
];

/// Look up the driver for a vendor/product pair.
pub fn find(vid: u16, pid: u16) -> Option<&'static Driver> {
    DRIVERS.iter().find(|d| d.vid == vid && d.pid == pid)
}

/// Check whether hardware with this vendor/product pair is supported.
#[inline]
pub fn is_supported(vid: u16, pid: u16) -> bool {
    find(vid, pid).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::HEADER_LEN;

    #[test]
    fn test_no_duplicate_keys() {
        for (i, a) in DRIVERS.iter().enumerate() {
            for b in &DRIVERS[i + 1..] {
                assert!(
                    (a.vid, a.pid) != (b.vid, b.pid),
                    "duplicate driver key {:04X}:{:04X}",
                    a.vid,
                    a.pid
                );
            }
        }
    }

    #[test]
    fn test_known_devices_resolve() {
        assert!(is_supported(VENDOR_ID, PID_COREVIEW_8));
        assert!(is_supported(VENDOR_ID, PID_COREVIEW_DUO));
        assert!(!is_supported(VENDOR_ID, 0x0000));
        assert!(!is_supported(0x0000, PID_COREVIEW_8));

        assert_eq!(find(VENDOR_ID, PID_COREVIEW_8).unwrap().name, "CoreView 8");
    }

    #[test]
    fn test_capability_tables_sane() {
        for driver in DRIVERS {
            if !driver.caps.formats.is_empty() {
                // Frame-taking classes must fit the header in one chunk
                // and have a real pixel area.
                assert!(driver.caps.max_chunk >= HEADER_LEN, "{}", driver.name);
                assert!(driver.caps.width > 0 && driver.caps.height > 0, "{}", driver.name);
            }
            assert!(driver.caps.max_fps > 0, "{}", driver.name);
        }
    }
}
