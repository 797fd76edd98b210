//! Byte-level decryption front end with configuration-selectable methods

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::{debug, warn};

use crate::bigint::BigIntegerContents;
use crate::crypto::symmetric_shuffle;
use crate::error::{Error, Result};
use crate::memory::FromLeBytes;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DecryptionMethod {
    /// Sign XOR key, end words swapped and XORed
    #[default]
    SymmetricShuffle,
    /// Repeating-key XOR over every byte
    Xor,
}

/// One encrypted value located in the target, with its bytes copied out
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EncryptedBigInteger {
    pub container: u64,
    pub value_ptr: u64,
    pub key_ptr: u64,
    pub encrypted: Vec<u8>,
    pub key: Vec<u8>,
    pub decrypted: Option<Vec<u8>>,
}

impl EncryptedBigInteger {
    pub fn is_decrypted(&self) -> bool {
        self.decrypted.is_some()
    }
}

#[derive(Debug, Default)]
pub struct DecryptionEngine {
    method: DecryptionMethod,
    successful: usize,
    failed: usize,
}

impl DecryptionEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(method: DecryptionMethod) -> Self {
        Self {
            method,
            ..Self::default()
        }
    }

    pub fn method(&self) -> DecryptionMethod {
        self.method
    }

    pub fn set_method(&mut self, method: DecryptionMethod) {
        self.method = method;
    }

    /// Whether `key` is usable with the current method
    pub fn validate_key(&self, key: &[u8]) -> bool {
        match self.method {
            DecryptionMethod::SymmetricShuffle => key.len() >= u32::SIZE,
            DecryptionMethod::Xor => !key.is_empty(),
        }
    }

    pub fn decrypt_data(&self, data: &[u8], key: &[u8]) -> Result<Vec<u8>> {
        if !self.validate_key(key) {
            return Err(Error::Decryption(format!(
                "{}-byte key is not valid for {}",
                key.len(),
                self.method
            )));
        }

        match self.method {
            DecryptionMethod::SymmetricShuffle => shuffle_bytes(data, u32::from_le_slice(key)),
            DecryptionMethod::Xor => Ok(data
                .iter()
                .zip(key.iter().cycle())
                .map(|(byte, k)| byte ^ k)
                .collect()),
        }
    }

    /// Decrypt every pending item in place; returns how many succeeded
    pub fn decrypt_multiple(&mut self, items: &mut [EncryptedBigInteger]) -> usize {
        let mut count = 0;
        for item in items.iter_mut().filter(|item| !item.is_decrypted()) {
            match self.decrypt_data(&item.encrypted, &item.key) {
                Ok(plain) => {
                    debug!("Decrypted value in container 0x{:X}", item.container);
                    item.decrypted = Some(plain);
                    self.successful += 1;
                    count += 1;
                }
                Err(e) => {
                    warn!("Container 0x{:X}: {}", item.container, e);
                    self.failed += 1;
                }
            }
        }
        count
    }

    pub fn successful(&self) -> usize {
        self.successful
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn reset_statistics(&mut self) {
        self.successful = 0;
        self.failed = 0;
    }
}

/// Shuffle applied to the serialized `[sign][words...]` form
fn shuffle_bytes(data: &[u8], key: u32) -> Result<Vec<u8>> {
    let mut contents = BigIntegerContents::from_bytes(0, data).ok_or_else(|| {
        Error::Decryption(format!(
            "{} bytes is not a sign followed by whole words",
            data.len()
        ))
    })?;
    symmetric_shuffle(&mut contents.sign, &mut contents.words, key);
    Ok(contents.to_bytes())
}
