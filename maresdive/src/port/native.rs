//! Native serial port implementation using the `serialport` crate.
//!
//! This module provides the serial transport for native platforms
//! (Linux, macOS, Windows, FreeBSD, etc.).

use {
    crate::{
        error::Result,
        port::{
            DataBits, Direction, FlowControl, Parity, SerialSettings, StopBits, Transport,
            TransportKind,
        },
    },
    log::trace,
    serialport::ClearBuffer,
    std::{
        io::{Read, Write},
        time::Duration,
    },
};

/// Native serial transport.
pub struct NativePort {
    port: Box<dyn serialport::SerialPort>,
    name: String,
    timeout: Duration,
}

impl NativePort {
    /// Open a serial port by name.
    ///
    /// The port is opened with generic defaults (115200 8N1, 1 s timeout);
    /// the session driver reconfigures the line before talking to a device.
    pub fn open(port_name: &str) -> Result<Self> {
        let timeout = Duration::from_millis(1000);
        let port = serialport::new(port_name, SerialSettings::default().baud_rate)
            .timeout(timeout)
            .open()?;

        Ok(Self {
            port,
            name: port_name.to_owned(),
            timeout,
        })
    }

    /// Get the port name/path.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Transport for NativePort {
    fn kind(&self) -> TransportKind {
        TransportKind::Serial
    }

    fn configure(&mut self, settings: &SerialSettings) -> Result<()> {
        trace!(
            "Configuring {}: {} baud, {:?} {:?} {:?}",
            self.name, settings.baud_rate, settings.data_bits, settings.parity, settings.stop_bits
        );
        self.port.set_baud_rate(settings.baud_rate)?;
        self.port.set_data_bits(settings.data_bits.into())?;
        self.port.set_parity(settings.parity.into())?;
        self.port.set_stop_bits(settings.stop_bits.into())?;
        self.port.set_flow_control(settings.flow_control.into())?;
        Ok(())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.port.set_timeout(timeout)?;
        self.timeout = timeout;
        Ok(())
    }

    fn set_dtr(&mut self, level: bool) -> Result<()> {
        trace!("Setting DTR to {level}");
        self.port.write_data_terminal_ready(level)?;
        Ok(())
    }

    fn set_rts(&mut self, level: bool) -> Result<()> {
        trace!("Setting RTS to {level}");
        self.port.write_request_to_send(level)?;
        Ok(())
    }

    fn purge(&mut self, direction: Direction) -> Result<()> {
        self.port.clear(match direction {
            Direction::Input => ClearBuffer::Input,
            Direction::Output => ClearBuffer::Output,
            Direction::All => ClearBuffer::All,
        })?;
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        crate::interrupt_requested()
    }
}

impl Read for NativePort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }
}

impl Write for NativePort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.port.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }
}

// Type conversions from our types to serialport types

impl From<DataBits> for serialport::DataBits {
    fn from(bits: DataBits) -> Self {
        match bits {
            DataBits::Five => Self::Five,
            DataBits::Six => Self::Six,
            DataBits::Seven => Self::Seven,
            DataBits::Eight => Self::Eight,
        }
    }
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => Self::None,
            Parity::Odd => Self::Odd,
            Parity::Even => Self::Even,
        }
    }
}

impl From<StopBits> for serialport::StopBits {
    fn from(bits: StopBits) -> Self {
        match bits {
            StopBits::One => Self::One,
            StopBits::Two => Self::Two,
        }
    }
}

impl From<FlowControl> for serialport::FlowControl {
    fn from(flow: FlowControl) -> Self {
        match flow {
            FlowControl::None => Self::None,
            FlowControl::Hardware => Self::Hardware,
            FlowControl::Software => Self::Software,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_settings_default() {
        let settings = SerialSettings::default();
        assert_eq!(settings.baud_rate, 115200);
        assert_eq!(settings.data_bits, DataBits::Eight);
        assert_eq!(settings.parity, Parity::None);
        assert_eq!(settings.stop_bits, StopBits::One);
        assert_eq!(settings.flow_control, FlowControl::None);
    }

    #[test]
    fn test_parity_conversion() {
        assert_eq!(serialport::Parity::from(Parity::Even), serialport::Parity::Even);
        assert_eq!(serialport::Parity::from(Parity::None), serialport::Parity::None);
    }
}
