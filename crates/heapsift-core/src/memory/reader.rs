use crate::error::{Error, Result};
use crate::memory::process::ProcessHandle;
use crate::memory::region::MemoryRegion;

/// Largest single read or write forwarded to the target (16 MiB)
pub const MAX_TRANSFER_SIZE: usize = 16 * 1024 * 1024;

/// Fixed-size little-endian value that can be decoded from target memory
pub trait FromLeBytes: Sized {
    const SIZE: usize;

    /// Decode from the first `SIZE` bytes of `bytes`
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_from_le_bytes {
    ($($ty:ty),*) => {
        $(
            impl FromLeBytes for $ty {
                const SIZE: usize = std::mem::size_of::<$ty>();

                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_from_le_bytes!(u8, u16, u32, u64, i32, i64);

impl FromLeBytes for bool {
    const SIZE: usize = 1;

    fn from_le_slice(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Trait for reading memory from a process
pub trait ReadMemory {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;

    /// Regions of the target's address space, in ascending address order
    fn regions(&self) -> Result<Vec<MemoryRegion>>;

    fn write_bytes(&self, address: u64, _bytes: &[u8]) -> Result<()> {
        Err(Error::MemoryWriteFailed {
            address,
            message: "reader is read-only".to_string(),
        })
    }

    /// Read `T::SIZE` bytes and decode them. A short read is a failure.
    fn read_value<T: FromLeBytes>(&self, address: u64) -> Result<T> {
        let bytes = self.read_bytes(address, T::SIZE)?;
        if bytes.len() < T::SIZE {
            return Err(Error::MemoryReadFailed {
                address,
                message: format!("short read: {} of {} bytes", bytes.len(), T::SIZE),
            });
        }
        Ok(T::from_le_slice(&bytes))
    }

    fn read_i32(&self, address: u64) -> Result<i32> {
        self.read_value(address)
    }

    fn read_u32(&self, address: u64) -> Result<u32> {
        self.read_value(address)
    }

    fn read_u64(&self, address: u64) -> Result<u64> {
        self.read_value(address)
    }

    fn read_bool(&self, address: u64) -> Result<bool> {
        self.read_value(address)
    }

    /// Read `count` consecutive u32 values in a single transfer
    fn read_u32_array(&self, address: u64, count: usize) -> Result<Vec<u32>> {
        let size = count
            .checked_mul(4)
            .ok_or(Error::TransferTooLarge {
                size: usize::MAX,
                max: MAX_TRANSFER_SIZE,
            })?;
        let bytes = self.read_bytes(address, size)?;
        if bytes.len() < size {
            return Err(Error::MemoryReadFailed {
                address,
                message: format!("short read: {} of {} bytes", bytes.len(), size),
            });
        }
        Ok(bytes
            .chunks_exact(4)
            .map(u32::from_le_slice)
            .collect())
    }
}

impl<R: ReadMemory + ?Sized> ReadMemory for &R {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(address, size)
    }

    fn regions(&self) -> Result<Vec<MemoryRegion>> {
        (**self).regions()
    }

    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()> {
        (**self).write_bytes(address, bytes)
    }
}

/// Memory reader bound to an attached process
pub struct MemoryReader<'a> {
    process: &'a ProcessHandle,
}

impl<'a> MemoryReader<'a> {
    pub fn new(process: &'a ProcessHandle) -> Self {
        Self { process }
    }

    pub fn process(&self) -> &ProcessHandle {
        self.process
    }

    fn check_size(size: usize) -> Result<()> {
        if size > MAX_TRANSFER_SIZE {
            return Err(Error::TransferTooLarge {
                size,
                max: MAX_TRANSFER_SIZE,
            });
        }
        Ok(())
    }
}

impl ReadMemory for MemoryReader<'_> {
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        Self::check_size(size)?;
        self.process.read_memory(address, size)
    }

    fn regions(&self) -> Result<Vec<MemoryRegion>> {
        self.process.regions()
    }

    fn write_bytes(&self, address: u64, bytes: &[u8]) -> Result<()> {
        Self::check_size(bytes.len())?;
        self.process.write_memory(address, bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MockMemoryBuilder;

    #[test]
    fn test_typed_reads() {
        let reader = MockMemoryBuilder::new()
            .base(0x10000)
            .with_i32(0, -5)
            .with_u32(4, 0xDEADBEEF)
            .with_u64(8, 0x1122_3344_5566_7788)
            .with_bytes(16, &[1])
            .build();

        assert_eq!(reader.read_i32(0x10000).unwrap(), -5);
        assert_eq!(reader.read_u32(0x10004).unwrap(), 0xDEADBEEF);
        assert_eq!(reader.read_u64(0x10008).unwrap(), 0x1122_3344_5566_7788);
        assert!(reader.read_bool(0x10010).unwrap());
    }

    #[test]
    fn test_read_outside_memory_fails() {
        let reader = MockMemoryBuilder::new().base(0x10000).with_u32(0, 1).build();
        assert!(reader.read_u32(0x20000).is_err());
        // Straddling the end of the segment
        assert!(reader.read_u64(0x10000).is_err());
    }

    #[test]
    fn test_read_u32_array_is_all_or_nothing() {
        let reader = MockMemoryBuilder::new()
            .base(0x10000)
            .with_u32s(0, &[1, 2, 3])
            .build();

        assert_eq!(reader.read_u32_array(0x10000, 3).unwrap(), vec![1, 2, 3]);
        assert!(reader.read_u32_array(0x10000, 4).is_err());
        assert!(reader.read_u32_array(0x10000, 0).unwrap().is_empty());
    }

    #[test]
    fn test_reference_forwarding() {
        let reader = MockMemoryBuilder::new().base(0x10000).with_u32(0, 7).build();
        let by_ref = &reader;
        assert_eq!(by_ref.read_u32(0x10000).unwrap(), 7);
    }
}
