//! Object header and method table decoding

use serde::Serialize;

use crate::memory::FromLeBytes;
use crate::memory::is_valid_pointer;
use crate::memory::layout::{method_table as mt, object};

/// Header preceding every managed object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectHeader {
    pub sync_block_index: u32,
}

impl ObjectHeader {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        (bytes.len() >= object::HEADER_SIZE as usize).then(|| Self {
            sync_block_index: u32::from_le_slice(bytes),
        })
    }

    /// Zero, or a plausible sync block index
    pub fn is_valid(&self) -> bool {
        self.sync_block_index <= object::MAX_SYNC_BLOCK_INDEX
    }
}

/// Type descriptor referenced by every managed object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MethodTable {
    pub flags: u32,
    pub base_size: u32,
    pub flags2: u16,
    pub token: u16,
    pub num_vtable_slots: u16,
    pub num_interfaces: u16,
    pub parent: u64,
    pub module: u64,
    pub class: u64,
}

impl MethodTable {
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < mt::SIZE {
            return None;
        }
        let at = |offset: u64| &bytes[offset as usize..];
        Some(Self {
            flags: u32::from_le_slice(at(mt::FLAGS)),
            base_size: u32::from_le_slice(at(mt::BASE_SIZE)),
            flags2: u16::from_le_slice(at(mt::FLAGS2)),
            token: u16::from_le_slice(at(mt::TOKEN)),
            num_vtable_slots: u16::from_le_slice(at(mt::NUM_VTABLE_SLOTS)),
            num_interfaces: u16::from_le_slice(at(mt::NUM_INTERFACES)),
            parent: u64::from_le_slice(at(mt::PARENT)),
            module: u64::from_le_slice(at(mt::MODULE)),
            class: u64::from_le_slice(at(mt::CLASS)),
        })
    }

    /// Structural plausibility: sizes and counts within bounds, and every
    /// non-null pointer inside the user address range.
    pub fn is_valid(&self) -> bool {
        let pointer_ok = |p: u64| p == 0 || is_valid_pointer(p);

        (mt::MIN_BASE_SIZE..=mt::MAX_BASE_SIZE).contains(&self.base_size)
            && self.num_vtable_slots <= mt::MAX_VTABLE_SLOTS
            && self.num_interfaces <= mt::MAX_INTERFACES
            && pointer_ok(self.parent)
            && pointer_ok(self.module)
            && pointer_ok(self.class)
    }

    /// Name used when no type name can be resolved
    pub fn fallback_name(&self) -> String {
        format!("UnknownType_0x{:X}", self.token)
    }

    #[cfg(test)]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(mt::SIZE);
        bytes.extend(self.flags.to_le_bytes());
        bytes.extend(self.base_size.to_le_bytes());
        bytes.extend(self.flags2.to_le_bytes());
        bytes.extend(self.token.to_le_bytes());
        bytes.extend(self.num_vtable_slots.to_le_bytes());
        bytes.extend(self.num_interfaces.to_le_bytes());
        bytes.extend(self.parent.to_le_bytes());
        bytes.extend(self.module.to_le_bytes());
        bytes.extend(self.class.to_le_bytes());
        bytes
    }

    #[cfg(test)]
    pub fn sample(class: u64) -> Self {
        Self {
            flags: 0,
            base_size: 0x18,
            flags2: 0,
            token: 0x42,
            num_vtable_slots: 4,
            num_interfaces: 0,
            parent: 0,
            module: 0,
            class,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_bounds() {
        assert!(ObjectHeader { sync_block_index: 0 }.is_valid());
        assert!(ObjectHeader { sync_block_index: 0x100_0000 }.is_valid());
        assert!(!ObjectHeader { sync_block_index: 0x100_0001 }.is_valid());
        assert!(ObjectHeader::from_bytes(&[0, 0]).is_none());
    }

    #[test]
    fn test_decode_layout() {
        let table = MethodTable {
            flags: 0x1122_3344,
            base_size: 0x20,
            flags2: 0x5566,
            token: 0x0201,
            num_vtable_slots: 12,
            num_interfaces: 3,
            parent: 0x10_0000,
            module: 0x20_0000,
            class: 0x30_0000,
        };
        let bytes = table.to_bytes();
        assert_eq!(bytes.len(), 40);
        assert_eq!(MethodTable::from_bytes(&bytes), Some(table));
        assert!(MethodTable::from_bytes(&bytes[..39]).is_none());
    }

    #[test]
    fn test_oversized_base_size_rejected() {
        let mut table = MethodTable::sample(0);
        assert!(table.is_valid());

        table.base_size = 0x2000;
        assert!(!table.is_valid());

        table.base_size = 3;
        assert!(!table.is_valid());
    }

    #[test]
    fn test_count_and_pointer_bounds() {
        let mut table = MethodTable::sample(0);
        table.num_vtable_slots = 10_001;
        assert!(!table.is_valid());

        let mut table = MethodTable::sample(0);
        table.num_interfaces = 1_001;
        assert!(!table.is_valid());

        let mut table = MethodTable::sample(0);
        table.parent = 0x1234;
        assert!(!table.is_valid());

        let table = MethodTable::sample(0x8000_0000_0000);
        assert!(!table.is_valid());
    }

    #[test]
    fn test_fallback_name() {
        let mut table = MethodTable::sample(0);
        table.token = 0x2A;
        assert_eq!(table.fallback_name(), "UnknownType_0x2A");
    }
}
