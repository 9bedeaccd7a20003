//! Backward, wraparound-aware streaming over a ring-buffer memory region.
//!
//! Dive profiles live in a circular region of device memory: new records
//! overwrite the oldest ones, and a head pointer marks the most recent byte.
//! [`RingStream`] walks that region backward from the head, fetching device
//! memory in transport-sized chunks and folding the wraparound into the
//! address arithmetic, so record parsing never has to think about the ring
//! bounds.

use crate::error::{Error, Result};

/// Addressed access to device memory.
///
/// The seam between the ring stream and whatever performs the actual
/// protocol exchanges; implemented by the session driver, and by plain
/// in-memory images in tests.
pub trait MemoryRead {
    /// Read `out.len()` bytes starting at `address`.
    fn read_memory(&mut self, address: u32, out: &mut [u8]) -> Result<()>;
}

/// Streams a ring-buffer region backward from its head pointer.
///
/// Successive [`read`](Self::read) calls return adjacent spans moving
/// toward older data; within each returned span the bytes are in device
/// address order. The stream wraps from the region start back to its end
/// and keeps at most one fetched chunk cached.
pub struct RingStream<'a, M: MemoryRead> {
    memory: &'a mut M,
    begin: u32,
    end: u32,
    address: u32,
    cache: Vec<u8>,
    available: usize,
}

impl<'a, M: MemoryRead> RingStream<'a, M> {
    /// Create a stream over `[begin, end)` starting at `head` and moving
    /// backward, fetching `chunk_size` bytes per device read.
    pub fn new(
        memory: &'a mut M,
        chunk_size: usize,
        begin: u32,
        end: u32,
        head: u32,
    ) -> Result<Self> {
        if begin >= end {
            return Err(Error::InvalidArgument(format!(
                "empty ring bounds (0x{begin:08X}..0x{end:08X})"
            )));
        }
        if chunk_size == 0 {
            return Err(Error::InvalidArgument("zero chunk size".into()));
        }
        if head < begin || head > end {
            return Err(Error::InvalidArgument(format!(
                "head pointer 0x{head:08X} outside 0x{begin:08X}..0x{end:08X}"
            )));
        }

        Ok(Self {
            memory,
            begin,
            end,
            address: head,
            cache: vec![0; chunk_size],
            available: 0,
        })
    }

    fn fetch(&mut self) -> Result<()> {
        let mut address = self.address;
        if address == self.begin {
            // Reached the region start: continue from the top.
            address = self.end;
        }

        let span = (address - self.begin) as usize;
        let len = self.cache.len().min(span);
        address -= len as u32;

        self.memory.read_memory(address, &mut self.cache[..len])?;
        self.address = address;
        self.available = len;
        Ok(())
    }

    /// Fill `out` with the bytes immediately preceding the previous read in
    /// ring order. `advance` is invoked with the size of each span served,
    /// for progress accounting.
    pub fn read(&mut self, out: &mut [u8], mut advance: impl FnMut(usize)) -> Result<()> {
        let mut remaining = out.len();
        while remaining > 0 {
            if self.available == 0 {
                self.fetch()?;
            }

            let length = self.available.min(remaining);
            let src = self.available - length;
            out[remaining - length..remaining].copy_from_slice(&self.cache[src..src + length]);
            self.available -= length;
            remaining -= length;
            advance(length);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat memory image; addresses map directly to indices.
    struct FakeMemory {
        data: Vec<u8>,
        reads: Vec<(u32, usize)>,
    }

    impl FakeMemory {
        fn patterned(size: usize) -> Self {
            Self {
                data: (0..size).map(|i| (i % 251) as u8).collect(),
                reads: Vec::new(),
            }
        }
    }

    impl MemoryRead for FakeMemory {
        fn read_memory(&mut self, address: u32, out: &mut [u8]) -> Result<()> {
            self.reads.push((address, out.len()));
            let start = address as usize;
            out.copy_from_slice(&self.data[start..start + out.len()]);
            Ok(())
        }
    }

    const BEGIN: u32 = 100;
    const END: u32 = 200;

    #[test]
    fn test_backward_reads_are_adjacent() {
        let mut memory = FakeMemory::patterned(256);
        let expected = memory.data.clone();
        let mut stream = RingStream::new(&mut memory, 16, BEGIN, END, 150).unwrap();

        let mut first = [0u8; 30];
        stream.read(&mut first, |_| {}).unwrap();
        assert_eq!(first.as_slice(), &expected[120..150]);

        let mut second = [0u8; 20];
        stream.read(&mut second, |_| {}).unwrap();
        assert_eq!(second.as_slice(), &expected[100..120]);
    }

    #[test]
    fn test_wraparound_to_region_end() {
        let mut memory = FakeMemory::patterned(256);
        let expected = memory.data.clone();
        let mut stream = RingStream::new(&mut memory, 16, BEGIN, END, 110).unwrap();

        // 10 bytes before the head, then wrapping into the top of the ring.
        let mut out = [0u8; 25];
        stream.read(&mut out, |_| {}).unwrap();
        assert_eq!(&out[15..], &expected[100..110]);
        assert_eq!(&out[..15], &expected[185..200]);
    }

    #[test]
    fn test_head_at_begin_wraps_immediately() {
        let mut memory = FakeMemory::patterned(256);
        let expected = memory.data.clone();
        let mut stream = RingStream::new(&mut memory, 32, BEGIN, END, BEGIN).unwrap();

        let mut out = [0u8; 8];
        stream.read(&mut out, |_| {}).unwrap();
        assert_eq!(out.as_slice(), &expected[192..200]);
    }

    #[test]
    fn test_chunk_clamped_at_region_start() {
        let mut memory = FakeMemory::patterned(256);
        let mut stream = RingStream::new(&mut memory, 64, BEGIN, END, 110).unwrap();

        let mut out = [0u8; 10];
        stream.read(&mut out, |_| {}).unwrap();
        // Only 10 bytes exist between the region start and the head.
        assert_eq!(memory.reads, vec![(100, 10)]);
    }

    #[test]
    fn test_advance_reports_all_bytes() {
        let mut memory = FakeMemory::patterned(256);
        let mut stream = RingStream::new(&mut memory, 16, BEGIN, END, 180).unwrap();

        let mut total = 0;
        let mut out = [0u8; 50];
        stream.read(&mut out, |n| total += n).unwrap();
        assert_eq!(total, 50);
    }

    #[test]
    fn test_rejects_bad_bounds() {
        let mut memory = FakeMemory::patterned(256);
        assert!(matches!(
            RingStream::new(&mut memory, 16, END, BEGIN, 150),
            Err(Error::InvalidArgument(_))
        ));
        let mut memory = FakeMemory::patterned(256);
        assert!(matches!(
            RingStream::new(&mut memory, 0, BEGIN, END, 150),
            Err(Error::InvalidArgument(_))
        ));
        let mut memory = FakeMemory::patterned(256);
        assert!(matches!(
            RingStream::new(&mut memory, 16, BEGIN, END, 250),
            Err(Error::InvalidArgument(_))
        ));
    }
}
