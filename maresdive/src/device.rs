//! Session driver for the Icon HD family.
//!
//! [`IconHd::open`] brings a freshly opened transport into a protocol-ready
//! state, identifies the attached hardware variant and returns a session
//! bound to that variant's memory geometry. The session then offers
//! addressed memory reads, a full memory dump and newest-first dive
//! enumeration with fingerprint-based incremental sync.

use std::time::Duration;

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, info};

use crate::error::{Error, Result};
use crate::events::{DeviceInfo, EventHandler, Progress};
use crate::model::{DiveMode, Layout, Model};
use crate::port::{Direction, Parity, SerialSettings, Transport};
use crate::protocol::link::Link;
use crate::rbstream::{MemoryRead, RingStream};

/// Size of the identification block reported by the device.
pub const VERSION_SIZE: usize = 140;

/// Size of a dive fingerprint.
pub const FINGERPRINT_SIZE: usize = 10;

/// Head pointer value marking an empty ring buffer.
const RB_EMPTY: u32 = 0xFFFF_FFFF;

/// Configuration addresses holding the ring-buffer head pointer. The second
/// is consulted only when the first reads as empty.
const RB_HEAD_ADDRESSES: [u32; 2] = [0x2001, 0x3001];

/// Address of the serial number.
const SERIAL_ADDRESS: u32 = 0x0C;

/// One dive record, borrowed from the enumeration scratch buffer.
///
/// The record bytes are laid out as stored on the device: a 4-byte length
/// field, the profile samples, then the dive header at the tail. The
/// fingerprint is a sub-range of the header.
#[derive(Debug, Clone, Copy)]
pub struct Dive<'a> {
    /// Raw record bytes.
    pub data: &'a [u8],
    /// Fingerprint identifying this dive.
    pub fingerprint: &'a [u8],
}

/// An open session with an Icon HD family dive computer.
pub struct IconHd<T: Transport> {
    link: Link<T>,
    model: Model,
    layout: Layout,
    packet_size: usize,
    version: [u8; VERSION_SIZE],
    fingerprint: [u8; FINGERPRINT_SIZE],
}

impl<T: Transport> IconHd<T> {
    /// Open a session on `transport`.
    ///
    /// Configures the line (115200 8E1, 1 s timeout, DTR/RTS deasserted),
    /// purges stale data and identifies the attached device. On any failure
    /// the transport is dropped and no session is returned.
    pub fn open(transport: T) -> Result<Self> {
        let mut link = Link::new(transport);

        let settings = SerialSettings {
            baud_rate: 115200,
            parity: Parity::Even,
            ..SerialSettings::default()
        };
        link.transport_mut().configure(&settings)?;
        link.transport_mut().set_timeout(Duration::from_millis(1000))?;
        link.transport_mut().set_dtr(false)?;
        link.transport_mut().set_rts(false)?;
        link.transport_mut().purge(Direction::All)?;

        let mut version = [0u8; VERSION_SIZE];
        link.identify(&mut version)?;

        let model = Model::detect(&version);
        info!("detected {} (model code 0x{:02X})", model, model.code());

        Ok(Self {
            link,
            model,
            layout: model.layout(),
            packet_size: model.packet_size(),
            version,
            fingerprint: [0; FINGERPRINT_SIZE],
        })
    }

    /// The identified hardware variant.
    pub fn model(&self) -> Model {
        self.model
    }

    /// The memory layout of the identified variant.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Maximum payload of one addressed-read exchange.
    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Raw identification block as reported by the device.
    pub fn identification(&self) -> &[u8] {
        &self.version
    }

    /// Set the fingerprint of the most recent already-downloaded dive.
    ///
    /// Enumeration stops when it encounters a dive carrying this
    /// fingerprint. An empty slice clears the fingerprint, so enumeration
    /// returns every dive on the device.
    pub fn set_fingerprint(&mut self, data: &[u8]) -> Result<()> {
        if !data.is_empty() && data.len() != FINGERPRINT_SIZE {
            return Err(Error::InvalidArgument(format!(
                "fingerprint must be empty or {FINGERPRINT_SIZE} bytes, got {}",
                data.len()
            )));
        }

        if data.is_empty() {
            self.fingerprint = [0; FINGERPRINT_SIZE];
        } else {
            self.fingerprint.copy_from_slice(data);
        }
        Ok(())
    }

    /// Read `out.len()` bytes of device memory starting at `address`.
    pub fn read(&mut self, address: u32, out: &mut [u8]) -> Result<()> {
        let mut address = address;
        for chunk in out.chunks_mut(self.packet_size) {
            self.link.read_block(address, chunk)?;
            address += chunk.len() as u32;
        }
        Ok(())
    }

    /// Download the full memory image.
    pub fn dump(&mut self, events: &mut dyn EventHandler) -> Result<Vec<u8>> {
        events.vendor(&self.version);

        let size = self.layout.memory_size as usize;
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(size).map_err(|_| Error::OutOfMemory)?;
        buffer.resize(size, 0);

        let mut progress = Progress::new(size as u32);
        progress.emit(events);

        let mut nbytes = 0;
        while nbytes < size {
            let len = self.packet_size.min(size - nbytes);
            self.read(nbytes as u32, &mut buffer[nbytes..nbytes + len])?;
            nbytes += len;
            progress.advance(events, len as u32);
        }

        Ok(buffer)
    }

    /// Enumerate dives newest-first.
    ///
    /// The callback receives each dive not yet marked as downloaded by the
    /// session fingerprint; returning `false` stops the enumeration early.
    /// Running out of intact records in the ring buffer ends the walk
    /// silently: partially overwritten history is the expected steady state,
    /// not an error.
    pub fn dives<F>(&mut self, events: &mut dyn EventHandler, mut callback: F) -> Result<()>
    where
        F: FnMut(Dive<'_>) -> bool,
    {
        let model = self.model;
        let layout = self.layout;
        let packet_size = self.packet_size;
        let fingerprint = self.fingerprint;
        let capacity = layout.rb_capacity() as usize;

        let mut progress = Progress::new(layout.rb_capacity() + 4);
        progress.emit(events);

        events.vendor(&self.version);

        let mut serial = [0u8; 4];
        self.read(SERIAL_ADDRESS, &mut serial)?;
        progress.advance(events, serial.len() as u32);

        events.device_info(&DeviceInfo {
            model: model.code(),
            firmware: 0,
            serial: LittleEndian::read_u32(&serial),
        });

        // Locate the head of the profile ring buffer.
        let mut head = RB_EMPTY;
        for &address in &RB_HEAD_ADDRESSES {
            let mut pointer = [0u8; 4];
            self.read(address, &mut pointer)?;
            progress.grow(pointer.len() as u32);
            progress.advance(events, pointer.len() as u32);

            head = LittleEndian::read_u32(&pointer);
            if head != RB_EMPTY {
                break;
            }
        }
        if head < layout.rb_profile_begin || head >= layout.rb_profile_end {
            if head == RB_EMPTY {
                debug!("ring buffer is empty, no dives");
                return Ok(());
            }
            return Err(Error::DataFormat(format!(
                "ring buffer head pointer out of range (0x{head:08X})"
            )));
        }

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(capacity)
            .map_err(|_| Error::OutOfMemory)?;
        buffer.resize(capacity, 0);

        let peek = model.peek_size();
        let mut stream = RingStream::new(
            self,
            packet_size,
            layout.rb_profile_begin,
            layout.rb_profile_end,
            head,
        )?;

        // Walk backward from the head. `offset` is the low edge of the
        // not-yet-parsed window inside the scratch buffer; each iteration
        // peels one record off its tail.
        let mut offset = capacity;
        while offset >= peek + 4 {
            stream.read(&mut buffer[offset - peek..offset], |n| {
                progress.advance(events, n as u32);
            })?;

            let (type_field, nsamples) = if model.samples_first() {
                (
                    LittleEndian::read_u16(&buffer[offset - peek + 2..]),
                    LittleEndian::read_u16(&buffer[offset - peek..]),
                )
            } else {
                (
                    LittleEndian::read_u16(&buffer[offset - peek..]),
                    LittleEndian::read_u16(&buffer[offset - peek + 2..]),
                )
            };
            if type_field == 0xFFFF || nsamples == 0xFFFF {
                debug!("erased memory reached, no more dives");
                break;
            }

            let mode = DiveMode::from_type(type_field);
            let shape = model.record_shape(mode);
            let header_size = shape.header_size;
            if offset < header_size {
                break; // Header truncated by the ring wraparound.
            }

            stream.read(&mut buffer[offset - header_size..offset - peek], |n| {
                progress.advance(events, n as u32);
            })?;

            let header = &buffer[offset - header_size..offset];
            let total = 4
                + header_size as u64
                + u64::from(nsamples) * shape.sample_size as u64
                + model.extra_bytes(u32::from(nsamples), header);
            if (offset as u64) < total {
                break; // Oldest record partially overwritten with newer data.
            }
            let total = total as usize;

            stream.read(&mut buffer[offset - total..offset - header_size], |n| {
                progress.advance(events, n as u32);
            })?;

            offset -= total;

            // The stored length must equal the computed one; a mismatch
            // marks the oldest intact record.
            let length = LittleEndian::read_u32(&buffer[offset..]) as usize;
            if length != total {
                debug!("length mismatch (stored {length}, computed {total}), stopping");
                break;
            }

            let fp_start = offset + length - header_size + shape.fingerprint_offset;
            let fp = &buffer[fp_start..fp_start + FINGERPRINT_SIZE];
            if fp == fingerprint.as_slice() {
                debug!("fingerprint match, remaining dives already downloaded");
                break;
            }

            let dive = Dive {
                data: &buffer[offset..offset + length],
                fingerprint: fp,
            };
            if !callback(dive) {
                break;
            }
        }

        Ok(())
    }
}

impl<T: Transport> MemoryRead for IconHd<T> {
    fn read_memory(&mut self, address: u32, out: &mut [u8]) -> Result<()> {
        self.read(address, out)
    }
}
