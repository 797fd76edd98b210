//! Pointer plausibility checks.

/// Lowest address treated as a plausible user-space pointer.
pub const MIN_VALID_POINTER: u64 = 0x10000;
/// Highest address treated as a plausible user-space pointer (x64 user half).
pub const MAX_VALID_POINTER: u64 = 0x7FFF_FFFF_FFFF;

/// Returns true if `address` lies in `[MIN_VALID_POINTER, MAX_VALID_POINTER]`.
///
/// Null and kernel-half values fail. An address that passes may still be
/// unmapped; callers find that out on the read.
pub fn is_valid_pointer(address: u64) -> bool {
    (MIN_VALID_POINTER..=MAX_VALID_POINTER).contains(&address)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_invalid() {
        assert!(!is_valid_pointer(0));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(is_valid_pointer(0x10000));
        assert!(is_valid_pointer(0x7FFF_FFFF_FFFF));
        assert!(!is_valid_pointer(0xFFFF));
        assert!(!is_valid_pointer(0x8000_0000_0000));
    }

    #[test]
    fn test_typical_addresses() {
        assert!(is_valid_pointer(0x1_4000_0000));
        assert!(is_valid_pointer(0x7FF6_1234_0000));
        assert!(!is_valid_pointer(0xFFFF_8000_0000_0000));
        assert!(!is_valid_pointer(u64::MAX));
    }
}
