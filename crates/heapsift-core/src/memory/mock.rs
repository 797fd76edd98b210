//! In-memory `ReadMemory` implementation for tests

use std::cell::RefCell;

use crate::error::{Error, Result};
use crate::memory::ReadMemory;
use crate::memory::region::{MemoryRegion, Protection};

#[derive(Debug, Clone)]
struct Segment {
    base: u64,
    data: Vec<u8>,
}

impl Segment {
    fn range(&self, address: u64, size: usize) -> Option<std::ops::Range<usize>> {
        let start = address.checked_sub(self.base)? as usize;
        let end = start.checked_add(size)?;
        (start <= self.data.len() && end <= self.data.len()).then_some(start..end)
    }
}

/// Mock memory made of disjoint byte segments
pub struct MockMemoryReader {
    segments: RefCell<Vec<Segment>>,
    regions: Vec<MemoryRegion>,
}

impl MockMemoryReader {
    /// Bytes currently stored at `address`, for asserting on writes
    pub fn snapshot(&self, address: u64, size: usize) -> Option<Vec<u8>> {
        self.segments
            .borrow()
            .iter()
            .find_map(|s| s.range(address, size).map(|r| s.data[r].to_vec()))
    }
}

impl ReadMemory for MockMemoryReader {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        self.snapshot(address, size)
            .ok_or_else(|| Error::MemoryReadFailed {
                address,
                message: format!("{} bytes not mapped", size),
            })
    }

    fn regions(&self) -> Result<Vec<MemoryRegion>> {
        Ok(self.regions.clone())
    }

    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()> {
        let mut segments = self.segments.borrow_mut();
        for segment in segments.iter_mut() {
            if let Some(range) = segment.range(address, bytes.len()) {
                segment.data[range].copy_from_slice(bytes);
                return Ok(());
            }
        }
        Err(Error::MemoryWriteFailed {
            address,
            message: format!("{} bytes not mapped", bytes.len()),
        })
    }
}

/// Builder for `MockMemoryReader`
///
/// Offsets passed to the `with_*` methods are relative to the current
/// segment base set by [`MockMemoryBuilder::base`]. The current segment grows
/// (zero filled) as values are written past its end.
pub struct MockMemoryBuilder {
    segments: Vec<Segment>,
    current: Segment,
    regions: Vec<MemoryRegion>,
}

impl MockMemoryBuilder {
    pub fn new() -> Self {
        Self {
            segments: Vec::new(),
            current: Segment {
                base: 0x10000,
                data: Vec::new(),
            },
            regions: Vec::new(),
        }
    }

    /// Start a new segment at `address`
    pub fn base(mut self, address: u64) -> Self {
        self.finish_current();
        self.current.base = address;
        self
    }

    /// Zero-fill the current segment up to `size` bytes
    pub fn size(mut self, size: usize) -> Self {
        if self.current.data.len() < size {
            self.current.data.resize(size, 0);
        }
        self
    }

    pub fn with_bytes(mut self, offset: usize, bytes: &[u8]) -> Self {
        let end = offset + bytes.len();
        if self.current.data.len() < end {
            self.current.data.resize(end, 0);
        }
        self.current.data[offset..end].copy_from_slice(bytes);
        self
    }

    pub fn with_u32(self, offset: usize, value: u32) -> Self {
        self.with_bytes(offset, &value.to_le_bytes())
    }

    pub fn with_i32(self, offset: usize, value: i32) -> Self {
        self.with_bytes(offset, &value.to_le_bytes())
    }

    pub fn with_u16(self, offset: usize, value: u16) -> Self {
        self.with_bytes(offset, &value.to_le_bytes())
    }

    pub fn with_u64(self, offset: usize, value: u64) -> Self {
        self.with_bytes(offset, &value.to_le_bytes())
    }

    pub fn with_bool(self, offset: usize, value: bool) -> Self {
        self.with_bytes(offset, &[value as u8])
    }

    pub fn with_u32s(self, offset: usize, values: &[u32]) -> Self {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.with_bytes(offset, &bytes)
    }

    /// UTF-16 managed string body (length prefix + characters) at `offset`
    pub fn with_managed_string(self, offset: usize, text: &str) -> Self {
        let units: Vec<u16> = text.encode_utf16().collect();
        let mut bytes = (units.len() as u32).to_le_bytes().to_vec();
        bytes.extend(units.iter().flat_map(|u| u.to_le_bytes()));
        self.with_bytes(offset, &bytes)
    }

    /// Report `region` from `regions()` instead of the synthesized list
    pub fn with_region(mut self, region: MemoryRegion) -> Self {
        self.regions.push(region);
        self
    }

    pub fn build(mut self) -> MockMemoryReader {
        self.finish_current();
        let regions = if self.regions.is_empty() {
            let mut regions: Vec<MemoryRegion> = self
                .segments
                .iter()
                .map(|s| {
                    MemoryRegion::new(s.base, s.data.len() as u64, Protection::READ_WRITE, "PRIVATE")
                })
                .collect();
            regions.sort_by_key(|r| r.base);
            regions
        } else {
            self.regions
        };

        MockMemoryReader {
            segments: RefCell::new(self.segments),
            regions,
        }
    }

    fn finish_current(&mut self) {
        if !self.current.data.is_empty() {
            let base = self.current.base;
            let finished = std::mem::replace(
                &mut self.current,
                Segment {
                    base,
                    data: Vec::new(),
                },
            );
            self.segments.push(finished);
        }
    }
}

impl Default for MockMemoryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiple_segments() {
        let reader = MockMemoryBuilder::new()
            .base(0x10000)
            .with_u32(0, 1)
            .base(0x20000)
            .with_u32(0, 2)
            .build();

        assert_eq!(reader.read_u32(0x10000).unwrap(), 1);
        assert_eq!(reader.read_u32(0x20000).unwrap(), 2);
        assert_eq!(reader.regions().unwrap().len(), 2);
    }

    #[test]
    fn test_write_is_visible() {
        let reader = MockMemoryBuilder::new().base(0x10000).size(16).build();
        reader.write_bytes(0x10004, &[0xAA, 0xBB]).unwrap();
        assert_eq!(reader.snapshot(0x10004, 2).unwrap(), vec![0xAA, 0xBB]);
        assert!(reader.write_bytes(0x10010, &[1]).is_err());
    }

    #[test]
    fn test_managed_string_layout() {
        let reader = MockMemoryBuilder::new()
            .base(0x10000)
            .with_managed_string(0, "Ab")
            .build();
        assert_eq!(reader.read_u32(0x10000).unwrap(), 2);
        assert_eq!(reader.read_bytes(0x10004, 4).unwrap(), vec![b'A', 0, b'b', 0]);
    }
}
