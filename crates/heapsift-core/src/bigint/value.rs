//! Big-integer value types and rendering

use std::fmt;

use serde::Serialize;

use crate::memory::FromLeBytes;
use crate::memory::layout::big_integer;

/// Magnitude length from a probe of the first words.
///
/// The length is one past the last non-zero word. An all-zero probe gives 1
/// for a non-zero sign and 0 otherwise. Values longer than the probe are
/// truncated to it.
pub fn derive_word_count(sign: i32, probe: &[u32]) -> usize {
    match probe.iter().rposition(|&w| w != 0) {
        Some(index) => index + 1,
        None if sign != 0 => 1,
        None => 0,
    }
}

/// Big integer decoded with the runtime's standard layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DotNetBigIntegerData {
    pub sign: i32,
    pub words_ptr: u64,
    /// Magnitude, least significant word first
    pub words: Vec<u32>,
    pub valid: bool,
}

impl DotNetBigIntegerData {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn is_negative(&self) -> bool {
        self.sign < 0
    }

    /// Sign-prefixed hex, most significant word first.
    ///
    /// `0x0` for invalid or empty values.
    pub fn to_hex(&self) -> String {
        if !self.valid || self.words.is_empty() {
            return "0x0".to_string();
        }

        let mut out = String::from("0x");
        if self.is_negative() {
            out.push('-');
        }
        let mut words = self.words.iter().rev();
        if let Some(most_significant) = words.next() {
            out.push_str(&format!("{:x}", most_significant));
        }
        for word in words {
            out.push_str(&format!("{:08x}", word));
        }
        out
    }
}

/// `INVALID`, `0`, a signed decimal for one word, hex for more
impl fmt::Display for DotNetBigIntegerData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.valid {
            return f.write_str("INVALID");
        }
        if self.sign == 0 || self.words.is_empty() {
            return f.write_str("0");
        }
        if let [word] = self.words.as_slice() {
            let magnitude = *word as i64;
            let value = if self.is_negative() { -magnitude } else { magnitude };
            return write!(f, "{}", value);
        }
        f.write_str(&self.to_hex())
    }
}

/// The same bytes as a big integer, read without assuming the runtime
/// layout. This is the representation the obfuscation operates on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BigIntegerContents {
    pub sign: i32,
    pub words_ptr: u64,
    pub words: Vec<u32>,
}

impl BigIntegerContents {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Serialized form: sign followed by the words, little-endian
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + self.words.len() * 4);
        bytes.extend(self.sign.to_le_bytes());
        for word in &self.words {
            bytes.extend(word.to_le_bytes());
        }
        bytes
    }

    /// Inverse of [`BigIntegerContents::to_bytes`]; absent unless the length
    /// is a non-zero multiple of four.
    pub fn from_bytes(words_ptr: u64, bytes: &[u8]) -> Option<Self> {
        let word = big_integer::WORD as usize;
        if bytes.len() < word || bytes.len() % word != 0 {
            return None;
        }
        Some(Self {
            sign: i32::from_le_slice(bytes),
            words_ptr,
            words: bytes[word..].chunks_exact(word).map(u32::from_le_slice).collect(),
        })
    }

    pub fn into_big_integer(self) -> DotNetBigIntegerData {
        DotNetBigIntegerData {
            sign: self.sign,
            words_ptr: self.words_ptr,
            words: self.words,
            valid: true,
        }
    }
}
