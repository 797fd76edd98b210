//! Big-integer readers for the standard and obscured layouts

mod obscured;
mod reader;
mod value;

pub use obscured::{ObscuredBigIntegerData, ObscuredBigIntegerReader, SerializableBigInteger};
pub use reader::BigIntegerReader;
pub use value::{BigIntegerContents, DotNetBigIntegerData, derive_word_count};
