//! Memory layout constants for the managed-runtime structures we decode
//!
//! This module centralizes all offsets and sizes used when reading object
//! headers, method tables and big-integer values. These are heuristics tuned
//! to one Mono/CoreCLR build and will need retargeting for other versions.
//! Constants are organized by structure type.

/// Pointer size on the (x64) target
pub const POINTER_SIZE: u64 = 8;

/// Managed object layout: `[sync block index][method table pointer][fields]`
pub mod object {
    /// Size of the object header (sync block index)
    pub const HEADER_SIZE: u64 = 4;
    /// Method table pointer directly follows the header
    pub const METHOD_TABLE_PTR: u64 = HEADER_SIZE;
    /// First instance field
    pub const DATA: u64 = METHOD_TABLE_PTR + super::POINTER_SIZE;

    /// Sync block indices above this are implausible
    pub const MAX_SYNC_BLOCK_INDEX: u32 = 0x100_0000;
}

/// Method table (type descriptor) layout
pub mod method_table {
    pub const FLAGS: u64 = 0x00;
    pub const BASE_SIZE: u64 = 0x04;
    pub const FLAGS2: u64 = 0x08;
    pub const TOKEN: u64 = 0x0A;
    pub const NUM_VTABLE_SLOTS: u64 = 0x0C;
    pub const NUM_INTERFACES: u64 = 0x0E;
    pub const PARENT: u64 = 0x10;
    pub const MODULE: u64 = 0x18;
    pub const CLASS: u64 = 0x20;

    /// Bytes read for one method table
    pub const SIZE: usize = 0x28;

    pub const MIN_BASE_SIZE: u32 = 4;
    pub const MAX_BASE_SIZE: u32 = 0x1000;
    pub const MAX_VTABLE_SLOTS: u16 = 10_000;
    pub const MAX_INTERFACES: u16 = 1_000;
}

/// Managed string layout: `[header][method table][length: u32][UTF-16 data]`
pub mod string {
    pub const LENGTH: u64 = super::object::DATA;
    pub const CHARS: u64 = LENGTH + 4;

    /// Longest string accepted as a type name
    pub const MAX_LENGTH: u32 = 10_000;
}

/// Class descriptor offsets probed for a type name pointer, in order
pub const DEFAULT_TYPE_NAME_OFFSETS: [u64; 5] = [0x10, 0x18, 0x20, 0x28, 0x30];

/// Big integer layout: `[sign: i32][bits pointer]`
pub mod big_integer {
    pub const SIGN: u64 = 0;
    /// The bits pointer immediately follows the sign (no padding)
    pub const BITS_PTR: u64 = 4;
    pub const WORD: u64 = 4;

    /// Words probed when deriving the magnitude length
    pub const PROBE_WORDS: usize = 32;
    /// Derived lengths above this are rejected
    pub const MAX_WORDS: usize = 10_000;
}

/// Obscured big integer layout
///
/// ```text
/// +0x00  hiddenValue       SerializableBigInteger (encrypted)
/// +0x10  fakeValue         SerializableBigInteger (plaintext decoy)
/// +0x20  currentCryptoKey  u32
/// +0x24  fakeValueActive   bool
/// +0x25  inited            bool
/// ```
pub mod obscured {
    /// Stride of one SerializableBigInteger (sign + pointer, padded to 8)
    pub const SERIALIZABLE_SIZE: u64 = 0x10;

    pub const HIDDEN_VALUE: u64 = 0;
    pub const FAKE_VALUE: u64 = HIDDEN_VALUE + SERIALIZABLE_SIZE;
    pub const CRYPTO_KEY: u64 = FAKE_VALUE + SERIALIZABLE_SIZE;
    pub const FAKE_VALUE_ACTIVE: u64 = CRYPTO_KEY + 4;
    pub const INITED: u64 = FAKE_VALUE_ACTIVE + 1;

    /// Total bytes spanned by the structure
    pub const SIZE: u64 = INITED + 1;
}

/// Region heuristics
pub mod heap {
    /// Smallest region considered a managed heap candidate (64KB)
    pub const MIN_REGION_SIZE: u64 = 64 * 1024;
}
