//! # maresdive
//!
//! A download driver for the Mares Icon HD family of dive computers.
//!
//! This crate speaks the framed serial protocol shared by the Icon HD and
//! its descendants (Matrix, Smart, Puck Pro, Nemo Wide 2, Puck 2, Quad,
//! and the Air variants), including:
//!
//! - Session setup and hardware variant identification
//! - Addressed reads of arbitrary device memory regions
//! - Full memory dumps
//! - Newest-first dive enumeration from the profile ring buffer, with
//!   fingerprint-based incremental download
//!
//! Decoding the dive records themselves (samples, physical units) is out of
//! scope; records are handed to the caller as raw byte ranges.
//!
//! ## Supported Transports
//!
//! - **Native** (default): serial ports on Linux, macOS and Windows via the
//!   `serialport` crate
//! - **Packetized**: any BLE bridge the embedder wraps in the
//!   [`Transport`] trait, reporting [`TransportKind::Ble`]
//!
//! ## Features
//!
//! - `native` (default): native serial port support
//! - `serde`: serialization support for data types
//!
//! ## Example
//!
//! ```rust,no_run
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect over a native serial port (native only)
//!     #[cfg(feature = "native")]
//!     {
//!         use maresdive::{IconHd, NativePort};
//!
//!         let port = NativePort::open("/dev/ttyUSB0")?;
//!         let mut device = IconHd::open(port)?;
//!         println!("connected to a {}", device.model());
//!
//!         device.dives(&mut (), |dive| {
//!             println!("dive: {} bytes", dive.data.len());
//!             true
//!         })?;
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::{Arc, OnceLock};

pub mod device;
pub mod error;
pub mod events;
pub mod model;
pub mod port;
pub mod protocol;
pub mod rbstream;

static INTERRUPT_CHECKER: OnceLock<Arc<dyn Fn() -> bool + Send + Sync>> = OnceLock::new();

/// Register a global interruption checker consulted before each command
/// exchange on native transports.
///
/// The checker should return `true` when the current operation should stop
/// (for example after receiving Ctrl-C in CLI applications).
pub fn set_interrupt_checker<F>(checker: F)
where
    F: Fn() -> bool + Send + Sync + 'static,
{
    let _ = INTERRUPT_CHECKER.set(Arc::new(checker));
}

/// Returns whether interruption was requested by the embedding application.
#[must_use]
pub fn interrupt_requested() -> bool {
    INTERRUPT_CHECKER
        .get()
        .is_some_and(|checker| checker())
}

// Re-exports for convenience
// Native-specific re-exports
#[cfg(feature = "native")]
pub use port::NativePort;
pub use {
    device::{Dive, FINGERPRINT_SIZE, IconHd, VERSION_SIZE},
    error::{Error, Result},
    events::{DeviceInfo, EventHandler},
    model::{DiveMode, Layout, Model, RecordShape},
    port::{
        DataBits, Direction, FlowControl, Parity, SerialSettings, StopBits, Transport,
        TransportKind,
    },
    rbstream::{MemoryRead, RingStream},
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    static FLAG: AtomicBool = AtomicBool::new(false);

    #[test]
    fn test_interrupt_checker_follows_flag() {
        // The checker can be registered once per process; toggle a shared
        // flag to observe both states.
        set_interrupt_checker(|| FLAG.load(Ordering::Relaxed));

        FLAG.store(false, Ordering::Relaxed);
        assert!(!interrupt_requested());

        FLAG.store(true, Ordering::Relaxed);
        assert!(interrupt_requested());

        FLAG.store(false, Ordering::Relaxed);
        assert!(!interrupt_requested());
    }
}
