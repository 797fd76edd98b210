//! Masked byte-pattern scanning and typed reads over a `ReadMemory`

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::MemoryScanningConfig;
use crate::error::{Error, Result};
use crate::logging::LogContext;
use crate::memory::{MAX_TRANSFER_SIZE, MemoryRegion, Protection, ReadMemory};
use crate::scan::cancel::CancelToken;
use crate::scan::signature::{Pattern, parse_pattern};

const DEFAULT_ALIGNMENT: usize = 4;

type ProgressCallback<'a> = Box<dyn Fn(f32) + 'a>;

/// Offsets in `buffer` where `pattern` matches, restricted to multiples of
/// `alignment`.
pub fn find_matches(buffer: &[u8], pattern: &Pattern, alignment: usize) -> Vec<usize> {
    if pattern.is_empty() || buffer.len() < pattern.len() {
        return Vec::new();
    }
    let alignment = alignment.max(1);
    let last = buffer.len() - pattern.len();

    match pattern.anchor() {
        Some((anchor_index, anchor_byte)) => {
            let haystack = &buffer[anchor_index..=last + anchor_index];
            memchr::memchr_iter(anchor_byte, haystack)
                .filter(|offset| offset % alignment == 0)
                .filter(|&offset| pattern.matches_at(buffer, offset))
                .collect()
        }
        // All wildcards: every aligned offset matches
        None => (0..=last).step_by(alignment).collect(),
    }
}

/// Pattern scanner over a configured set of regions.
///
/// The scanner never discovers regions on its own; callers set them with
/// [`MemoryScanner::set_regions`] or [`MemoryScanner::set_scan_range`].
pub struct MemoryScanner<'a, R: ReadMemory> {
    reader: &'a R,
    regions: Vec<MemoryRegion>,
    signatures: BTreeMap<String, Pattern>,
    max_read_size: usize,
    alignment: usize,
    progress: Option<ProgressCallback<'a>>,
    cancel: CancelToken,
    log: LogContext,
}

impl<'a, R: ReadMemory> MemoryScanner<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self {
            reader,
            regions: Vec::new(),
            signatures: BTreeMap::new(),
            max_read_size: MAX_TRANSFER_SIZE,
            alignment: DEFAULT_ALIGNMENT,
            progress: None,
            cancel: CancelToken::new(),
            log: LogContext::new(),
        }
    }

    pub fn with_log(mut self, log: LogContext) -> Self {
        self.log = log;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Apply read limits and signatures from configuration
    pub fn configure(&mut self, config: &MemoryScanningConfig) -> Result<()> {
        self.max_read_size = config.max_read_size.clamp(1, MAX_TRANSFER_SIZE);
        self.alignment = config.alignment.max(1);
        self.load_signatures(config)
    }

    pub fn reader(&self) -> &'a R {
        self.reader
    }

    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions
    }

    pub fn set_regions(&mut self, regions: Vec<MemoryRegion>) {
        self.regions = regions;
    }

    /// Replace the regions with one read-write region covering `[start, end)`
    pub fn set_scan_range(&mut self, start: u64, end: u64) {
        self.regions = vec![MemoryRegion::new(
            start,
            end.saturating_sub(start),
            Protection::READ_WRITE,
            "RANGE",
        )];
    }

    pub fn set_alignment(&mut self, alignment: usize) {
        self.alignment = alignment.max(1);
    }

    pub fn set_max_read_size(&mut self, size: usize) {
        self.max_read_size = size.clamp(1, MAX_TRANSFER_SIZE);
    }

    /// Install a callback receiving scan progress in `[0, 1]`
    pub fn set_progress_callback<F: Fn(f32) + 'a>(&mut self, callback: F) {
        self.progress = Some(Box::new(callback));
    }

    pub fn clear_progress_callback(&mut self) {
        self.progress = None;
    }

    // ---- signatures -------------------------------------------------------

    pub fn add_signature(&mut self, name: impl Into<String>, pattern: Pattern) {
        self.signatures.insert(name.into(), pattern);
    }

    pub fn load_signatures(&mut self, config: &MemoryScanningConfig) -> Result<()> {
        for (name, entry) in &config.signatures {
            let pattern = entry.parse()?;
            debug!("Loaded signature '{}': {}", name, pattern);
            self.signatures.insert(name.clone(), pattern);
        }
        Ok(())
    }

    pub fn signature(&self, name: &str) -> Option<&Pattern> {
        self.signatures.get(name)
    }

    pub fn signatures(&self) -> &BTreeMap<String, Pattern> {
        &self.signatures
    }

    // ---- scanning ---------------------------------------------------------

    /// Scan every configured region for `pattern`.
    ///
    /// Each region is read once, truncated to the maximum read size. Regions
    /// that cannot be read contribute nothing. Fails only on cancellation.
    pub fn scan(&self, pattern: &Pattern) -> Result<Vec<u64>> {
        let mut results = Vec::new();
        if pattern.is_empty() {
            return Ok(results);
        }

        let total = self.regions.len();
        for (index, region) in self.regions.iter().enumerate() {
            self.cancel.check()?;

            if region.size > 0 && region.base != 0 {
                results.extend(self.scan_region(region, pattern));
            }

            if let Some(progress) = &self.progress {
                progress((index + 1) as f32 / total as f32);
            }
        }

        debug!(
            "{}Pattern {} matched {} address(es) in {} region(s)",
            self.log.pad(),
            pattern,
            results.len(),
            total
        );
        Ok(results)
    }

    /// Scan with raw bytes and an optional mask (`0` = wildcard)
    pub fn scan_bytes(&self, bytes: &[u8], mask: Option<&[u8]>) -> Result<Vec<u64>> {
        let pattern = Pattern::with_mask(bytes, mask)?;
        self.scan(&pattern)
    }

    pub fn scan_hex(&self, pattern: &str) -> Result<Vec<u64>> {
        self.scan(&parse_pattern(pattern)?)
    }

    pub fn scan_signature(&self, name: &str) -> Result<Vec<u64>> {
        let pattern = self
            .signatures
            .get(name)
            .ok_or_else(|| Error::InvalidPattern(format!("Unknown signature '{}'", name)))?;
        info!("Scanning for signature '{}'", name);
        self.scan(pattern)
    }

    fn scan_region(&self, region: &MemoryRegion, pattern: &Pattern) -> Vec<u64> {
        let read_size = region.size.min(self.max_read_size as u64) as usize;
        let buffer = match self.reader.read_bytes(region.base, read_size) {
            Ok(buffer) => buffer,
            Err(e) => {
                debug!(
                    "{}Skipping region 0x{:X}: {}",
                    self.log.pad(),
                    region.base,
                    e
                );
                return Vec::new();
            }
        };

        find_matches(&buffer, pattern, self.alignment)
            .into_iter()
            .map(|offset| region.base + offset as u64)
            .collect()
    }

    // ---- typed reads ------------------------------------------------------

    pub fn read_bytes(&self, address: u64, size: usize) -> Option<Vec<u8>> {
        let bytes = self.reader.read_bytes(address, size).ok()?;
        (bytes.len() == size).then_some(bytes)
    }

    pub fn read_i32(&self, address: u64) -> Option<i32> {
        self.reader.read_i32(address).ok()
    }

    pub fn read_u32(&self, address: u64) -> Option<u32> {
        self.reader.read_u32(address).ok()
    }

    pub fn read_u64(&self, address: u64) -> Option<u64> {
        self.reader.read_u64(address).ok()
    }

    pub fn read_bool(&self, address: u64) -> Option<bool> {
        self.reader.read_bool(address).ok()
    }

    pub fn read_u32_array(&self, address: u64, count: usize) -> Option<Vec<u32>> {
        self.reader.read_u32_array(address, count).ok()
    }

    /// NUL-terminated byte string of at most `max_length` bytes
    pub fn read_string(&self, address: u64, max_length: usize) -> Option<String> {
        let bytes = self.reader.read_bytes(address, max_length).ok()?;
        let end = memchr::memchr(0, &bytes).unwrap_or(bytes.len());
        Some(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    // ---- pointers ---------------------------------------------------------

    pub fn follow_pointer(&self, address: u64) -> Option<u64> {
        self.read_u64(address)
    }

    /// Dereference `base + offsets[0]`, then `result + offsets[1]`, and so on.
    ///
    /// Returns every value reached; the chain stops at the first failed read.
    pub fn follow_pointer_chain(&self, base: u64, offsets: &[u64]) -> Vec<u64> {
        let mut chain = Vec::with_capacity(offsets.len());
        let mut current = base;
        for offset in offsets {
            match self.follow_pointer(current.wrapping_add(*offset)) {
                Some(next) => {
                    current = next;
                    chain.push(next);
                }
                None => break,
            }
        }
        chain
    }
}
