//! Transport abstraction for device communication.
//!
//! This module provides a unified `Transport` trait that abstracts over the
//! physical links an Icon HD family dive computer can be reached on:
//!
//! - **Serial** (USB cradle or clip): a plain byte stream
//! - **Packetized** (BLE bridge): data arrives in bounded wire packets
//!
//! ## Architecture
//!
//! The design separates I/O from protocol logic, so the protocol layer is
//! link-agnostic and testable against in-memory transports.
//!
//! ```text
//! +------------------+     +------------------+
//! |  Protocol Layer  |     |  Protocol Layer  |
//! +--------+---------+     +--------+---------+
//!          |                        |
//!          v                        v
//! +--------+---------+     +--------+---------+
//! | Transport Trait  |     | Transport Trait  |
//! +--------+---------+     +--------+---------+
//!          |                        |
//!          v                        v
//! +--------+---------+     +--------+---------+
//! | Native SerialPort|     | BLE bridge (any  |
//! |   (serialport)   |     |  embedder impl)  |
//! +------------------+     +------------------+
//! ```

#[cfg(feature = "native")]
pub mod native;

use std::io::{Read, Write};
use std::time::Duration;

use crate::error::Result;

/// Framing class of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Byte-stream transport (UART/USB CDC).
    Serial,
    /// Packet-oriented wireless transport.
    Ble,
}

/// Direction selector for buffer purges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Discard buffered input.
    Input,
    /// Discard buffered output.
    Output,
    /// Discard both directions.
    All,
}

/// Line settings applied to a serial transport.
#[derive(Debug, Clone)]
pub struct SerialSettings {
    /// Baud rate.
    pub baud_rate: u32,
    /// Data bits (typically 8).
    pub data_bits: DataBits,
    /// Parity.
    pub parity: Parity,
    /// Stop bits (typically One).
    pub stop_bits: StopBits,
    /// Flow control (typically None).
    pub flow_control: FlowControl,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            baud_rate: 115200,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            flow_control: FlowControl::None,
        }
    }
}

/// Number of data bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataBits {
    /// 5 data bits.
    Five,
    /// 6 data bits.
    Six,
    /// 7 data bits.
    Seven,
    /// 8 data bits.
    #[default]
    Eight,
}

/// Parity checking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Parity {
    /// No parity.
    #[default]
    None,
    /// Odd parity.
    Odd,
    /// Even parity.
    Even,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    /// 1 stop bit.
    #[default]
    One,
    /// 2 stop bits.
    Two,
}

/// Flow control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowControl {
    /// No flow control.
    #[default]
    None,
    /// Hardware flow control (RTS/CTS).
    Hardware,
    /// Software flow control (XON/XOFF).
    Software,
}

/// Unified transport trait for device communication.
///
/// Implementations exist for native serial ports via the `serialport` crate;
/// embedders bridging a BLE link implement the trait themselves and report
/// [`TransportKind::Ble`] so the protocol layer can adopt packetized framing.
///
/// Line-control operations default to no-ops: transports without the concept
/// (BLE bridges, test doubles) accept and ignore them.
pub trait Transport: Read + Write + Send {
    /// Framing class of this transport.
    fn kind(&self) -> TransportKind;

    /// Apply serial line settings.
    fn configure(&mut self, settings: &SerialSettings) -> Result<()> {
        let _ = settings;
        Ok(())
    }

    /// Set the read timeout.
    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        let _ = timeout;
        Ok(())
    }

    /// Set DTR (Data Terminal Ready) line state.
    fn set_dtr(&mut self, level: bool) -> Result<()> {
        let _ = level;
        Ok(())
    }

    /// Set RTS (Request To Send) line state.
    fn set_rts(&mut self, level: bool) -> Result<()> {
        let _ = level;
        Ok(())
    }

    /// Discard buffered, not yet transferred data.
    fn purge(&mut self, direction: Direction) -> Result<()> {
        let _ = direction;
        Ok(())
    }

    /// Whether the embedding application requested cancellation.
    ///
    /// Checked by the protocol layer before each command exchange.
    fn is_cancelled(&self) -> bool {
        false
    }
}

// Re-export the native implementation when available
#[cfg(feature = "native")]
pub use native::NativePort;
