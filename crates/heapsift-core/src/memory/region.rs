use std::fmt;

use serde::Serialize;

use super::layout::heap;

/// Windows page protection constants (`PAGE_*`)
pub mod page {
    pub const NOACCESS: u32 = 0x01;
    pub const READONLY: u32 = 0x02;
    pub const READWRITE: u32 = 0x04;
    pub const WRITECOPY: u32 = 0x08;
    pub const EXECUTE: u32 = 0x10;
    pub const EXECUTE_READ: u32 = 0x20;
    pub const EXECUTE_READWRITE: u32 = 0x40;
    pub const EXECUTE_WRITECOPY: u32 = 0x80;
    pub const GUARD: u32 = 0x100;
}

/// Page protection flags of a region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Protection(u32);

impl Protection {
    pub const READ_WRITE: Protection = Protection(page::READWRITE);
    pub const READ_ONLY: Protection = Protection(page::READONLY);

    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }

    pub fn is_guarded(self) -> bool {
        self.0 & page::GUARD != 0
    }

    pub fn is_readable(self) -> bool {
        !self.is_guarded()
            && self.0
                & (page::READONLY
                    | page::READWRITE
                    | page::WRITECOPY
                    | page::EXECUTE_READ
                    | page::EXECUTE_READWRITE
                    | page::EXECUTE_WRITECOPY)
                != 0
    }

    /// Plain read-write pages (copy-on-write excluded)
    pub fn is_read_write(self) -> bool {
        self.0 & (page::READWRITE | page::EXECUTE_READWRITE) != 0
    }

    pub fn is_executable(self) -> bool {
        self.0
            & (page::EXECUTE
                | page::EXECUTE_READ
                | page::EXECUTE_READWRITE
                | page::EXECUTE_WRITECOPY)
            != 0
    }
}

impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = if self.is_readable() { 'r' } else { '-' };
        let w = if self.is_read_write() {
            'w'
        } else if self.0 & (page::WRITECOPY | page::EXECUTE_WRITECOPY) != 0 {
            'c'
        } else {
            '-'
        };
        let x = if self.is_executable() { 'x' } else { '-' };
        write!(f, "{}{}{}", r, w, x)
    }
}

/// Snapshot of one region of the target's address space
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryRegion {
    pub base: u64,
    pub size: u64,
    pub protection: Protection,
    pub committed: bool,
    pub label: String,
}

impl MemoryRegion {
    pub fn new(base: u64, size: u64, protection: Protection, label: impl Into<String>) -> Self {
        Self {
            base,
            size,
            protection,
            committed: true,
            label: label.into(),
        }
    }

    pub fn end(&self) -> u64 {
        self.base.saturating_add(self.size)
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.base && address < self.end()
    }

    /// Committed, read-write and at least `min_size` bytes.
    ///
    /// Nothing here consults the runtime's own heap bookkeeping, so false
    /// positives are expected.
    pub fn is_heap_candidate(&self, min_size: u64) -> bool {
        self.committed && self.protection.is_read_write() && self.size >= min_size
    }

    pub fn is_default_heap_candidate(&self) -> bool {
        self.is_heap_candidate(heap::MIN_REGION_SIZE)
    }
}

impl fmt::Display for MemoryRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:012X}-0x{:012X} {} {:>10} {}",
            self.base,
            self.end(),
            self.protection,
            self.size,
            self.label
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protection_flags() {
        let rw = Protection::from_raw(page::READWRITE);
        assert!(rw.is_readable());
        assert!(rw.is_read_write());
        assert!(!rw.is_executable());
        assert_eq!(rw.to_string(), "rw-");

        let rx = Protection::from_raw(page::EXECUTE_READ);
        assert!(rx.is_readable());
        assert!(!rx.is_read_write());
        assert!(rx.is_executable());
        assert_eq!(rx.to_string(), "r-x");

        let guarded = Protection::from_raw(page::READWRITE | page::GUARD);
        assert!(!guarded.is_readable());

        assert_eq!(Protection::from_raw(page::WRITECOPY).to_string(), "rc-");
    }

    #[test]
    fn test_region_contains() {
        let region = MemoryRegion::new(0x10000, 0x1000, Protection::READ_WRITE, "test");
        assert!(region.contains(0x10000));
        assert!(region.contains(0x10FFF));
        assert!(!region.contains(0x11000));
        assert!(!region.contains(0xFFFF));
    }

    #[test]
    fn test_heap_candidate() {
        let big = MemoryRegion::new(0x10000, 0x10000, Protection::READ_WRITE, "heap");
        assert!(big.is_default_heap_candidate());

        let small = MemoryRegion::new(0x10000, 0xFFFF, Protection::READ_WRITE, "heap");
        assert!(!small.is_default_heap_candidate());

        let read_only = MemoryRegion::new(0x10000, 0x100000, Protection::READ_ONLY, "image");
        assert!(!read_only.is_default_heap_candidate());

        let mut reserved = big.clone();
        reserved.committed = false;
        assert!(!reserved.is_default_heap_candidate());
    }
}
