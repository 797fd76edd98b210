use std::fmt;

use crate::error::{Error, Result};

/// Byte pattern with a per-byte mask (`0` = wildcard)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub bytes: Vec<u8>,
    pub mask: Vec<u8>,
}

impl Pattern {
    /// Pattern where every byte must match
    pub fn exact(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            mask: vec![1; bytes.len()],
        }
    }

    /// Pattern with an optional mask; an absent mask matches every byte
    pub fn with_mask(bytes: &[u8], mask: Option<&[u8]>) -> Result<Self> {
        match mask {
            None => Ok(Self::exact(bytes)),
            Some(mask) if mask.len() == bytes.len() => Ok(Self {
                bytes: bytes.to_vec(),
                mask: mask.to_vec(),
            }),
            Some(mask) => Err(Error::InvalidPattern(format!(
                "mask length {} does not match pattern length {}",
                mask.len(),
                bytes.len()
            ))),
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn is_wildcard(&self, index: usize) -> bool {
        self.mask[index] == 0
    }

    /// First non-wildcard byte and its index
    pub fn anchor(&self) -> Option<(usize, u8)> {
        (0..self.len())
            .find(|&i| !self.is_wildcard(i))
            .map(|i| (i, self.bytes[i]))
    }

    /// True if the pattern matches `buffer` starting at `offset`
    pub fn matches_at(&self, buffer: &[u8], offset: usize) -> bool {
        let Some(window) = buffer.get(offset..offset + self.len()) else {
            return false;
        };
        window
            .iter()
            .zip(self.bytes.iter().zip(&self.mask))
            .all(|(b, (p, m))| *m == 0 || b == p)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_pattern(self))
    }
}

/// Parse a hex pattern such as `"DE AD ?? EF"`.
///
/// `??` (or `?`) is a wildcard: pattern byte 0, mask 0. Tokens longer than two
/// characters are split into byte pairs, so `"DEADBEEF"` is also accepted.
pub fn parse_pattern(pattern: &str) -> Result<Pattern> {
    let mut bytes = Vec::new();
    let mut mask = Vec::new();

    for token in pattern.split_whitespace() {
        if token == "??" || token == "?" {
            bytes.push(0);
            mask.push(0);
            continue;
        }

        if token.len() % 2 != 0 {
            return Err(Error::InvalidPattern(format!(
                "Invalid pattern token '{}': odd number of hex digits",
                token
            )));
        }

        for pair in token.as_bytes().chunks(2) {
            let pair = std::str::from_utf8(pair)
                .map_err(|_| Error::InvalidPattern(format!("Invalid pattern token '{}'", token)))?;
            if pair == "??" {
                bytes.push(0);
                mask.push(0);
                continue;
            }
            let value = u8::from_str_radix(pair, 16).map_err(|e| {
                Error::InvalidPattern(format!("Invalid pattern token '{}': {}", token, e))
            })?;
            bytes.push(value);
            mask.push(1);
        }
    }

    if bytes.is_empty() {
        return Err(Error::InvalidPattern("Pattern is empty".to_string()));
    }

    Ok(Pattern { bytes, mask })
}

pub fn format_pattern(pattern: &Pattern) -> String {
    pattern
        .bytes
        .iter()
        .zip(&pattern.mask)
        .map(|(b, m)| {
            if *m == 0 {
                "??".to_string()
            } else {
                format!("{:02X}", b)
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pattern_with_wildcards() {
        let pattern = parse_pattern("48 8D 0D ?? ?? ?? ??").unwrap();
        assert_eq!(pattern.len(), 7);
        assert_eq!(pattern.bytes[..3], [0x48, 0x8D, 0x0D]);
        assert_eq!(pattern.bytes[3], 0);
        assert_eq!(pattern.mask, vec![1, 1, 1, 0, 0, 0, 0]);
    }

    #[test]
    fn test_parse_compact_pattern() {
        let pattern = parse_pattern("DEADBEEF").unwrap();
        assert_eq!(pattern, Pattern::exact(&[0xDE, 0xAD, 0xBE, 0xEF]));

        let pattern = parse_pattern("DE??BEEF").unwrap();
        assert_eq!(pattern.mask, vec![1, 0, 1, 1]);
    }

    #[test]
    fn test_parse_pattern_errors() {
        assert!(parse_pattern("").is_err());
        assert!(parse_pattern("   ").is_err());
        assert!(parse_pattern("GG").is_err());
        assert!(parse_pattern("ABC").is_err());
    }

    #[test]
    fn test_format_pattern_roundtrip() {
        let formatted = "48 8D 0D ?? FF";
        let parsed = parse_pattern(formatted).unwrap();
        assert_eq!(format_pattern(&parsed), formatted);
        assert_eq!(parsed.to_string(), formatted);
    }

    #[test]
    fn test_masked_match() {
        let pattern = parse_pattern("DE ?? BE EF").unwrap();
        assert!(pattern.matches_at(&[0xDE, 0x00, 0xBE, 0xEF], 0));
        assert!(pattern.matches_at(&[0xDE, 0xFF, 0xBE, 0xEF], 0));
        assert!(!pattern.matches_at(&[0xDE, 0xFF, 0xBE, 0xEE], 0));
        assert!(!pattern.matches_at(&[0xDE, 0xFF, 0xBE], 0));
    }

    #[test]
    fn test_anchor_skips_leading_wildcards() {
        let pattern = parse_pattern("?? ?? 4C 8B").unwrap();
        assert_eq!(pattern.anchor(), Some((2, 0x4C)));
        let all_wild = Pattern::with_mask(&[1, 2], Some(&[0, 0])).unwrap();
        assert_eq!(all_wild.anchor(), None);
    }

    #[test]
    fn test_mask_length_mismatch() {
        assert!(Pattern::with_mask(&[1, 2, 3], Some(&[1, 1])).is_err());
    }
}
