//! Standard big-integer reads: `[sign: i32][pointer to u32 words]`

use std::fmt::Display;

use tracing::{debug, info, warn};

use crate::bigint::value::{BigIntegerContents, DotNetBigIntegerData, derive_word_count};
use crate::logging::LogContext;
use crate::memory::layout::big_integer;
use crate::memory::{ReadMemory, is_valid_pointer};
use crate::scan::MemoryScanner;

/// Field logger shared by the readers: `info` when verbose, `debug` otherwise
pub(crate) fn log_field(
    log: &LogContext,
    verbose: bool,
    name: &str,
    address: u64,
    value: impl Display,
) {
    if verbose {
        info!("{}{}: 0x{:X} = {}", log.pad(), name, address, value);
    } else {
        debug!("{}{}: 0x{:X} = {}", log.pad(), name, address, value);
    }
}

pub(crate) fn log_step(log: &LogContext, verbose: bool, message: &str) {
    if verbose {
        info!("{}{}", log.pad(), message);
    } else {
        debug!("{}{}", log.pad(), message);
    }
}

pub struct BigIntegerReader<'s, 'a, R: ReadMemory> {
    scanner: &'s MemoryScanner<'a, R>,
    log: LogContext,
}

impl<'s, 'a, R: ReadMemory> BigIntegerReader<'s, 'a, R> {
    pub fn new(scanner: &'s MemoryScanner<'a, R>) -> Self {
        Self {
            scanner,
            log: LogContext::new(),
        }
    }

    pub fn with_log(mut self, log: LogContext) -> Self {
        self.log = log;
        self
    }

    pub fn read_big_integer(&self, address: u64) -> Option<DotNetBigIntegerData> {
        self.read(address, false)
    }

    /// Same as [`read_big_integer`](Self::read_big_integer), logging every
    /// field under nested indentation
    pub fn read_big_integer_verbose(&self, address: u64) -> Option<DotNetBigIntegerData> {
        info!("{}Reading BigInteger at 0x{:X}", self.log.pad(), address);
        let _indent = self.log.indent();
        let value = self.read(address, true)?;
        info!(
            "{}BigInteger parsed: sign {}, length {}, value {}",
            self.log.pad(),
            value.sign,
            value.len(),
            value
        );
        Some(value)
    }

    pub fn is_valid_big_integer(&self, address: u64) -> bool {
        self.read_big_integer(address).is_some()
    }

    fn read(&self, address: u64, verbose: bool) -> Option<DotNetBigIntegerData> {
        if !is_valid_pointer(address) {
            debug!("{}Invalid base address: 0x{:X}", self.log.pad(), address);
            return None;
        }

        let (sign, words_ptr) = self.read_header(address, verbose)?;
        if !is_valid_pointer(words_ptr) {
            debug!("{}Invalid words pointer: 0x{:X}", self.log.pad(), words_ptr);
            return None;
        }

        let words = self.read_words(sign, words_ptr, verbose)?;
        Some(DotNetBigIntegerData {
            sign,
            words_ptr,
            words,
            valid: true,
        })
    }

    /// Raw view of the same bytes; a null words pointer is accepted as an
    /// empty magnitude.
    pub fn read_contents(&self, address: u64, verbose: bool) -> Option<BigIntegerContents> {
        let (sign, words_ptr) = self.read_header(address, verbose)?;
        if words_ptr == 0 {
            log_step(&self.log, verbose, "Null words pointer, empty magnitude");
            return Some(BigIntegerContents {
                sign,
                words_ptr,
                words: Vec::new(),
            });
        }
        if !is_valid_pointer(words_ptr) {
            debug!("{}Invalid words pointer: 0x{:X}", self.log.pad(), words_ptr);
            return None;
        }

        let words = self.read_words(sign, words_ptr, verbose)?;
        Some(BigIntegerContents {
            sign,
            words_ptr,
            words,
        })
    }

    fn read_header(&self, address: u64, verbose: bool) -> Option<(i32, u64)> {
        let sign_addr = address + big_integer::SIGN;
        let sign = self.scanner.read_i32(sign_addr)?;
        log_field(&self.log, verbose, "sign", sign_addr, sign);

        let ptr_addr = address + big_integer::BITS_PTR;
        let words_ptr = self.scanner.read_u64(ptr_addr)?;
        log_field(
            &self.log,
            verbose,
            "bits_ptr",
            ptr_addr,
            format_args!("0x{:X}", words_ptr),
        );
        Some((sign, words_ptr))
    }

    fn read_words(&self, sign: i32, words_ptr: u64, verbose: bool) -> Option<Vec<u32>> {
        let probe = self
            .scanner
            .read_u32_array(words_ptr, big_integer::PROBE_WORDS)?;
        let length = derive_word_count(sign, &probe);
        log_field(&self.log, verbose, "determined_bits_length", words_ptr, length);

        if length > big_integer::MAX_WORDS {
            warn!("{}Implausible word count {}", self.log.pad(), length);
            return None;
        }
        if length == 0 {
            log_step(&self.log, verbose, "Zero length (value is zero)");
            return Some(Vec::new());
        }

        let words = self.scanner.read_u32_array(words_ptr, length)?;
        let _indent = self.log.indent();
        for (i, word) in words.iter().enumerate() {
            log_field(
                &self.log,
                verbose,
                &format!("bits[{}]", i),
                words_ptr + (i as u64) * big_integer::WORD,
                format_args!("0x{:08X}", word),
            );
        }
        Some(words)
    }
}
