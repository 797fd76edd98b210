use encoding_rs::UTF_16LE;

use crate::memory::layout::string;
use crate::memory::{ReadMemory, is_valid_pointer};

/// Read a managed string object: a u32 length at `+12` followed by UTF-16LE
/// code units at `+16`.
///
/// Absent for invalid pointers, failed reads and lengths above
/// [`string::MAX_LENGTH`].
pub fn read_managed_string<R: ReadMemory>(reader: &R, address: u64) -> Option<String> {
    if !is_valid_pointer(address) {
        return None;
    }

    let length = reader.read_u32(address + string::LENGTH).ok()?;
    if length > string::MAX_LENGTH {
        return None;
    }

    let byte_len = length as usize * 2;
    let bytes = reader.read_bytes(address + string::CHARS, byte_len).ok()?;
    if bytes.len() != byte_len {
        return None;
    }

    let (text, _) = UTF_16LE.decode_without_bom_handling(&bytes);
    Some(text.into_owned())
}
