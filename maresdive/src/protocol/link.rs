//! Transport packetizer and framed exchange.

use std::io;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::port::{Direction, Transport, TransportKind};
use crate::protocol::{ACK, CMD_READ, CMD_VERSION, END, MAX_RETRIES, WIRE_PACKET_SIZE};

/// A transport plus the receive cache needed to present a byte-stream
/// contract over packetized links.
///
/// On a packetized transport the device delivers data in wire packets of at
/// most [`WIRE_PACKET_SIZE`] bytes. At most one not-yet-consumed packet is
/// held in the cache; `available` and `offset` track the unread span.
pub(crate) struct Link<T: Transport> {
    transport: T,
    cache: [u8; WIRE_PACKET_SIZE],
    available: usize,
    offset: usize,
}

fn read_some<T: Transport>(transport: &mut T, buf: &mut [u8]) -> Result<usize> {
    match transport.read(buf) {
        Ok(0) => Err(Error::Timeout("no data from device".into())),
        Ok(n) => Ok(n),
        Err(e) if e.kind() == io::ErrorKind::TimedOut => {
            Err(Error::Timeout("read timed out".into()))
        },
        Err(e) => Err(Error::Io(e)),
    }
}

fn write_exact<T: Transport>(transport: &mut T, buf: &[u8]) -> Result<()> {
    match transport.write_all(buf) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::TimedOut => {
            Err(Error::Timeout("write timed out".into()))
        },
        Err(e) => Err(Error::Io(e)),
    }
}

impl<T: Transport> Link<T> {
    pub(crate) fn new(transport: T) -> Self {
        Self {
            transport,
            cache: [0; WIRE_PACKET_SIZE],
            available: 0,
            offset: 0,
        }
    }

    pub(crate) fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Read exactly `out.len()` bytes from the device.
    pub(crate) fn read_exact(&mut self, out: &mut [u8]) -> Result<()> {
        match self.transport.kind() {
            TransportKind::Serial => {
                let mut nbytes = 0;
                while nbytes < out.len() {
                    nbytes += read_some(&mut self.transport, &mut out[nbytes..])?;
                }
            },
            TransportKind::Ble => {
                let mut nbytes = 0;
                while nbytes < out.len() {
                    if self.available == 0 {
                        // Pull one wire packet into the cache.
                        self.available = read_some(&mut self.transport, &mut self.cache)?;
                        self.offset = 0;
                    }

                    let length = self.available.min(out.len() - nbytes);
                    out[nbytes..nbytes + length]
                        .copy_from_slice(&self.cache[self.offset..self.offset + length]);
                    self.available -= length;
                    self.offset += length;
                    nbytes += length;
                }
            },
        }

        Ok(())
    }

    /// Write all of `data` to the device.
    pub(crate) fn write_all(&mut self, data: &[u8]) -> Result<()> {
        match self.transport.kind() {
            TransportKind::Serial => write_exact(&mut self.transport, data)?,
            TransportKind::Ble => {
                for chunk in data.chunks(WIRE_PACKET_SIZE) {
                    write_exact(&mut self.transport, chunk)?;
                }
            },
        }

        self.transport.flush()?;
        Ok(())
    }

    /// One framed command/response exchange.
    ///
    /// The command must carry at least the 2-byte opcode; any payload beyond
    /// it is sent only after the device acknowledged the opcode.
    fn packet(&mut self, command: &[u8], answer: &mut [u8]) -> Result<()> {
        debug_assert!(command.len() >= 2, "command must carry a 2-byte opcode");

        if self.transport.is_cancelled() {
            return Err(Error::Cancelled);
        }

        self.write_all(&command[..2])?;

        let mut header = [0u8; 1];
        self.read_exact(&mut header)?;
        if header[0] != ACK {
            warn!("unexpected acknowledgement byte 0x{:02X}", header[0]);
            return Err(Error::Protocol(format!(
                "unexpected acknowledgement byte 0x{:02X}",
                header[0]
            )));
        }

        if command.len() > 2 {
            self.write_all(&command[2..])?;
        }

        self.read_exact(answer)?;

        let mut trailer = [0u8; 1];
        self.read_exact(&mut trailer)?;
        if trailer[0] != END {
            warn!("unexpected terminator byte 0x{:02X}", trailer[0]);
            return Err(Error::Protocol(format!(
                "unexpected terminator byte 0x{:02X}",
                trailer[0]
            )));
        }

        Ok(())
    }

    /// Execute an exchange, discarding corrupted packets and retrying.
    ///
    /// Only framing errors and timeouts are retried; I/O failures and
    /// cancellation abort immediately.
    pub(crate) fn transfer(&mut self, command: &[u8], answer: &mut [u8]) -> Result<()> {
        let mut retries = 0;
        loop {
            let err = match self.packet(command, answer) {
                Ok(()) => return Ok(()),
                Err(e @ (Error::Protocol(_) | Error::Timeout(_))) => e,
                Err(e) => return Err(e),
            };

            if retries >= MAX_RETRIES {
                return Err(err);
            }
            retries += 1;
            debug!("discarding corrupted exchange, retry {retries}/{MAX_RETRIES}: {err}");

            self.transport.purge(Direction::Input)?;
        }
    }

    /// Issue the identification command.
    pub(crate) fn identify(&mut self, version: &mut [u8]) -> Result<()> {
        self.transfer(&CMD_VERSION, version)
    }

    /// Issue one addressed-read command for `answer.len()` bytes.
    pub(crate) fn read_block(&mut self, address: u32, answer: &mut [u8]) -> Result<()> {
        let mut command = [0u8; 10];
        command[..2].copy_from_slice(&CMD_READ);
        command[2..6].copy_from_slice(&address.to_le_bytes());
        command[6..10].copy_from_slice(&(answer.len() as u32).to_le_bytes());
        self.transfer(&command, answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::{Read, Write};

    /// Scripted transport: each entry in `input` is returned by one read
    /// call, emulating wire packets and short reads.
    struct MockTransport {
        kind: TransportKind,
        input: VecDeque<Vec<u8>>,
        writes: Vec<Vec<u8>>,
        purges: usize,
        cancelled: bool,
    }

    impl MockTransport {
        fn new(kind: TransportKind, input: Vec<Vec<u8>>) -> Self {
            Self {
                kind,
                input: input.into(),
                writes: Vec::new(),
                purges: 0,
                cancelled: false,
            }
        }
    }

    impl Read for MockTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let Some(mut chunk) = self.input.pop_front() else {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "script exhausted"));
            };
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.input.push_front(chunk.split_off(n));
            }
            Ok(n)
        }
    }

    impl Write for MockTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.writes.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for MockTransport {
        fn kind(&self) -> TransportKind {
            self.kind
        }

        fn purge(&mut self, _direction: Direction) -> Result<()> {
            self.purges += 1;
            Ok(())
        }

        fn is_cancelled(&self) -> bool {
            self.cancelled
        }
    }

    #[test]
    fn test_exchange_success() {
        let transport = MockTransport::new(
            TransportKind::Serial,
            vec![vec![ACK], vec![1, 2, 3, 4], vec![END]],
        );
        let mut link = Link::new(transport);

        let mut answer = [0u8; 4];
        link.transfer(&CMD_VERSION, &mut answer).unwrap();

        assert_eq!(answer, [1, 2, 3, 4]);
        assert_eq!(link.transport.writes, vec![CMD_VERSION.to_vec()]);
    }

    #[test]
    fn test_payload_sent_after_ack() {
        let transport = MockTransport::new(
            TransportKind::Serial,
            vec![vec![ACK], vec![0xAB, 0xCD], vec![END]],
        );
        let mut link = Link::new(transport);

        let mut answer = [0u8; 2];
        link.read_block(0x1234, &mut answer).unwrap();

        assert_eq!(link.transport.writes.len(), 2);
        assert_eq!(link.transport.writes[0], CMD_READ.to_vec());
        let mut payload = Vec::new();
        payload.extend_from_slice(&0x1234u32.to_le_bytes());
        payload.extend_from_slice(&2u32.to_le_bytes());
        assert_eq!(link.transport.writes[1], payload);
    }

    #[test]
    fn test_bad_ack_retries_then_succeeds() {
        let transport = MockTransport::new(
            TransportKind::Serial,
            vec![vec![0x00], vec![ACK], vec![5, 6], vec![END]],
        );
        let mut link = Link::new(transport);

        let mut answer = [0u8; 2];
        link.transfer(&CMD_VERSION, &mut answer).unwrap();

        assert_eq!(answer, [5, 6]);
        assert_eq!(link.transport.purges, 1);
        // Opcode written once per attempt.
        assert_eq!(link.transport.writes.len(), 2);
    }

    #[test]
    fn test_bad_trailer_is_protocol_error() {
        // Every attempt completes but carries a corrupted terminator.
        let mut script = Vec::new();
        for _ in 0..=MAX_RETRIES {
            script.push(vec![ACK]);
            script.push(vec![7]);
            script.push(vec![0x00]);
        }
        let transport = MockTransport::new(TransportKind::Serial, script);
        let mut link = Link::new(transport);

        let mut answer = [0u8; 1];
        let err = link.transfer(&CMD_VERSION, &mut answer).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(link.transport.purges, MAX_RETRIES as usize);
    }

    #[test]
    fn test_retries_exhausted_surfaces_protocol() {
        let bad: Vec<Vec<u8>> = (0..5).map(|_| vec![0x42]).collect();
        let transport = MockTransport::new(TransportKind::Serial, bad);
        let mut link = Link::new(transport);

        let mut answer = [0u8; 1];
        let err = link.transfer(&CMD_VERSION, &mut answer).unwrap_err();

        assert!(matches!(err, Error::Protocol(_)));
        assert_eq!(link.transport.purges, MAX_RETRIES as usize);
        // Initial attempt plus MAX_RETRIES reissues.
        assert_eq!(link.transport.writes.len(), 1 + MAX_RETRIES as usize);
    }

    #[test]
    fn test_empty_line_times_out() {
        let transport = MockTransport::new(TransportKind::Serial, vec![]);
        let mut link = Link::new(transport);

        let mut answer = [0u8; 1];
        let err = link.transfer(&CMD_VERSION, &mut answer).unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(link.transport.purges, MAX_RETRIES as usize);
    }

    #[test]
    fn test_cancelled_aborts_without_io() {
        let mut transport = MockTransport::new(TransportKind::Serial, vec![vec![ACK]]);
        transport.cancelled = true;
        let mut link = Link::new(transport);

        let mut answer = [0u8; 1];
        let err = link.transfer(&CMD_VERSION, &mut answer).unwrap_err();

        assert!(matches!(err, Error::Cancelled));
        assert!(link.transport.writes.is_empty());
        assert_eq!(link.transport.purges, 0);
    }

    #[test]
    fn test_ble_read_assembles_wire_packets() {
        let mut response: Vec<Vec<u8>> = vec![vec![ACK]];
        response.push((0..20u8).collect());
        // Second packet carries the last 24 data bytes plus the terminator.
        let mut tail: Vec<u8> = (20..44u8).collect();
        tail.push(END);
        response.push(tail);

        let transport = MockTransport::new(TransportKind::Ble, response);
        let mut link = Link::new(transport);

        let mut answer = [0u8; 44];
        link.transfer(&CMD_VERSION, &mut answer).unwrap();

        let expected: Vec<u8> = (0..44u8).collect();
        assert_eq!(answer.to_vec(), expected);
    }

    #[test]
    fn test_ble_write_is_chunked() {
        let transport = MockTransport::new(
            TransportKind::Ble,
            vec![vec![ACK], vec![0x01], vec![END]],
        );
        let mut link = Link::new(transport);

        let mut command = vec![0xC2, 0x67];
        command.extend(std::iter::repeat_n(0xEE, 48));
        let mut answer = [0u8; 1];
        link.transfer(&command, &mut answer).unwrap();

        let sizes: Vec<usize> = link.transport.writes.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![2, 20, 20, 8]);
    }
}
