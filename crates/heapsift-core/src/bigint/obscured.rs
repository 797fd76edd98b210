//! Obscured big integers: an encrypted hidden value, a plaintext decoy and
//! the key that ties them together

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bigint::reader::{BigIntegerReader, log_field, log_step};
use crate::bigint::value::{BigIntegerContents, DotNetBigIntegerData};
use crate::crypto::symmetric_shuffle;
use crate::logging::LogContext;
use crate::memory::layout::obscured;
use crate::memory::{ReadMemory, is_valid_pointer};
use crate::scan::MemoryScanner;

/// One byte range decoded in both views.
///
/// The standard view may fail (for example on a null words pointer); the raw
/// view is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SerializableBigInteger {
    pub standard: Option<DotNetBigIntegerData>,
    pub raw: BigIntegerContents,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObscuredBigIntegerData {
    /// Encrypted value
    pub hidden: SerializableBigInteger,
    /// Plaintext copy kept for tamper detection
    pub decoy: SerializableBigInteger,
    pub key: u32,
    pub decoy_active: bool,
    pub inited: bool,
    pub valid: bool,
}

impl ObscuredBigIntegerData {
    /// Hidden raw contents run through the symmetric shuffle with the key.
    ///
    /// Absent when the wrapper is invalid. Source bytes are never touched.
    pub fn decrypt(&self) -> Option<DotNetBigIntegerData> {
        if !self.valid {
            return None;
        }
        let mut contents = self.hidden.raw.clone();
        symmetric_shuffle(&mut contents.sign, &mut contents.words, self.key);
        Some(contents.into_big_integer())
    }

    pub fn decrypted_value_to_string(&self) -> String {
        self.decrypt()
            .map(|value| value.to_string())
            .unwrap_or_else(|| "DECRYPTION_FAILED".to_string())
    }

    pub fn decrypted_value_to_hex(&self) -> String {
        self.decrypt()
            .map(|value| value.to_hex())
            .unwrap_or_else(|| "DECRYPTION_FAILED".to_string())
    }

    /// False only when the decoy is active and disagrees with `decrypted`
    pub fn decoy_matches(&self, decrypted: &DotNetBigIntegerData) -> bool {
        !self.decoy_active
            || (self.decoy.raw.sign == decrypted.sign && self.decoy.raw.words == decrypted.words)
    }
}

pub struct ObscuredBigIntegerReader<'s, 'a, R: ReadMemory> {
    scanner: &'s MemoryScanner<'a, R>,
    bigint: BigIntegerReader<'s, 'a, R>,
    log: LogContext,
}

impl<'s, 'a, R: ReadMemory> ObscuredBigIntegerReader<'s, 'a, R> {
    pub fn new(scanner: &'s MemoryScanner<'a, R>) -> Self {
        Self {
            scanner,
            bigint: BigIntegerReader::new(scanner),
            log: LogContext::new(),
        }
    }

    pub fn with_log(mut self, log: LogContext) -> Self {
        self.bigint = self.bigint.with_log(log.clone());
        self.log = log;
        self
    }

    pub fn read_obscured_big_integer(&self, address: u64) -> Option<ObscuredBigIntegerData> {
        self.read(address, false)
    }

    /// Read with one log line per field, then attempt decryption
    pub fn read_obscured_big_integer_verbose(
        &self,
        address: u64,
    ) -> Option<ObscuredBigIntegerData> {
        info!("{}Reading ObscuredBigInteger at 0x{:X}", self.log.pad(), address);
        let _indent = self.log.indent();
        let data = self.read(address, true)?;

        info!("{}Attempting to decrypt hidden value...", self.log.pad());
        let _inner = self.log.indent();
        match data.decrypt() {
            Some(value) => info!("{}Decrypted hidden value: {}", self.log.pad(), value),
            None => warn!("{}Failed to decrypt hidden value", self.log.pad()),
        }
        Some(data)
    }

    pub fn is_valid_obscured_big_integer(&self, address: u64) -> bool {
        self.read_obscured_big_integer(address).is_some()
    }

    pub fn decrypt_hidden_value(
        &self,
        data: &ObscuredBigIntegerData,
    ) -> Option<DotNetBigIntegerData> {
        let decrypted = data.decrypt();
        if decrypted.is_none() {
            debug!("{}ObscuredBigInteger data is invalid", self.log.pad());
        }
        decrypted
    }

    fn read(&self, address: u64, verbose: bool) -> Option<ObscuredBigIntegerData> {
        if !is_valid_pointer(address) {
            debug!("{}Invalid base address: 0x{:X}", self.log.pad(), address);
            return None;
        }

        let hidden =
            self.read_serializable(address + obscured::HIDDEN_VALUE, "hiddenValue", verbose)?;
        let decoy = self.read_serializable(address + obscured::FAKE_VALUE, "fakeValue", verbose)?;

        let key_addr = address + obscured::CRYPTO_KEY;
        let key = self.scanner.read_u32(key_addr)?;
        log_field(
            &self.log,
            verbose,
            "currentCryptoKey",
            key_addr,
            format_args!("0x{:08X}", key),
        );

        let active_addr = address + obscured::FAKE_VALUE_ACTIVE;
        let decoy_active = self.scanner.read_bool(active_addr)?;
        log_field(&self.log, verbose, "fakeValueActive", active_addr, decoy_active);

        let inited_addr = address + obscured::INITED;
        let inited = self.scanner.read_bool(inited_addr)?;
        log_field(&self.log, verbose, "inited", inited_addr, inited);

        Some(ObscuredBigIntegerData {
            hidden,
            decoy,
            key,
            decoy_active,
            inited,
            valid: true,
        })
    }

    fn read_serializable(
        &self,
        address: u64,
        field: &str,
        verbose: bool,
    ) -> Option<SerializableBigInteger> {
        log_step(
            &self.log,
            verbose,
            &format!("Reading {} (SerializableBigInteger) at 0x{:X}", field, address),
        );
        let _indent = self.log.indent();

        let standard = if verbose {
            self.bigint.read_big_integer_verbose(address)
        } else {
            self.bigint.read_big_integer(address)
        };
        if standard.is_none() {
            debug!(
                "{}{} has no standard view, using raw contents",
                self.log.pad(),
                field
            );
        }

        let Some(raw) = self.bigint.read_contents(address, verbose) else {
            warn!("{}Failed to read raw contents of {}", self.log.pad(), field);
            return None;
        };

        Some(SerializableBigInteger { standard, raw })
    }
}
