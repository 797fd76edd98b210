//! Obfuscation removal

mod engine;
mod shuffle;

pub use engine::{DecryptionEngine, DecryptionMethod, EncryptedBigInteger};
pub use shuffle::symmetric_shuffle;
