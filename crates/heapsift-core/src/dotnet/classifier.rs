//! Heuristic classification of managed-runtime objects
//!
//! Nothing here talks to the runtime itself. Objects are recognised purely
//! from memory contents: a plausible header, a pointer to a plausible method
//! table, and a type name found by probing the class descriptor. All of it is
//! tuned to one runtime build and breaks silently on others.

use std::collections::HashMap;

use tracing::{debug, info};

use crate::config::DotNetConfig;
use crate::dotnet::header::{MethodTable, ObjectHeader};
use crate::dotnet::string::read_managed_string;
use crate::error::Result;
use crate::logging::LogContext;
use crate::memory::layout::{DEFAULT_TYPE_NAME_OFFSETS, POINTER_SIZE, heap, method_table, object};
use crate::memory::{FromLeBytes, MAX_TRANSFER_SIZE, MemoryRegion, ReadMemory, is_valid_pointer};
use crate::scan::CancelToken;

/// Type name substrings that identify big-integer carrying objects
pub const BIG_INTEGER_TYPE_PATTERNS: [&str; 4] = [
    "BigInteger",
    "System.Numerics.BigInteger",
    "SerializableBigInteger",
    "ObscuredBigInteger",
];

/// Bytes of an object needed to reach its method table pointer
const OBJECT_PREFIX: usize = (object::METHOD_TABLE_PTR + POINTER_SIZE) as usize;

pub struct RuntimeClassifier<'a, R: ReadMemory> {
    reader: &'a R,
    type_name_offsets: Vec<u64>,
    heap_min_region_size: u64,
    method_tables: HashMap<u64, MethodTable>,
    type_names: HashMap<u64, String>,
    cancel: CancelToken,
    log: LogContext,
}

impl<'a, R: ReadMemory> RuntimeClassifier<'a, R> {
    pub fn new(reader: &'a R) -> Self {
        Self {
            reader,
            type_name_offsets: DEFAULT_TYPE_NAME_OFFSETS.to_vec(),
            heap_min_region_size: heap::MIN_REGION_SIZE,
            method_tables: HashMap::new(),
            type_names: HashMap::new(),
            cancel: CancelToken::new(),
            log: LogContext::new(),
        }
    }

    pub fn with_config(mut self, config: &DotNetConfig) -> Self {
        if !config.type_name_offsets.is_empty() {
            self.type_name_offsets = config.type_name_offsets.clone();
        }
        self.heap_min_region_size = config.heap_min_region_size;
        self
    }

    pub fn with_log(mut self, log: LogContext) -> Self {
        self.log = log;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn type_name_offsets(&self) -> &[u64] {
        &self.type_name_offsets
    }

    // ---- single objects ---------------------------------------------------

    /// Method table pointer stored in the object, if it is a valid pointer
    pub fn method_table_address(&self, object_addr: u64) -> Option<u64> {
        if !is_valid_pointer(object_addr) {
            return None;
        }
        let header = ObjectHeader {
            sync_block_index: self.reader.read_u32(object_addr).ok()?,
        };
        if !header.is_valid() {
            return None;
        }
        let descriptor = self
            .reader
            .read_u64(object_addr + object::METHOD_TABLE_PTR)
            .ok()?;
        is_valid_pointer(descriptor).then_some(descriptor)
    }

    /// Read and validate the method table at `descriptor`, bypassing the cache
    pub fn read_method_table(&self, descriptor: u64) -> Option<MethodTable> {
        if !is_valid_pointer(descriptor) {
            return None;
        }
        let bytes = self.reader.read_bytes(descriptor, method_table::SIZE).ok()?;
        MethodTable::from_bytes(&bytes).filter(MethodTable::is_valid)
    }

    /// Cached method table lookup by descriptor address
    fn method_table_at(&mut self, descriptor: u64) -> Option<MethodTable> {
        if let Some(table) = self.method_tables.get(&descriptor) {
            return Some(*table);
        }
        let table = self.read_method_table(descriptor)?;
        self.method_tables.insert(descriptor, table);
        Some(table)
    }

    pub fn is_valid_object(&mut self, object_addr: u64) -> bool {
        self.get_method_table(object_addr).is_some()
    }

    /// Validated method table of the object at `object_addr`
    pub fn get_method_table(&mut self, object_addr: u64) -> Option<MethodTable> {
        let descriptor = self.method_table_address(object_addr)?;
        self.method_table_at(descriptor)
    }

    pub fn cached_method_table(&self, descriptor: u64) -> Option<&MethodTable> {
        self.method_tables.get(&descriptor)
    }

    /// Type name of the method table at `descriptor`.
    ///
    /// Probes the configured offsets from the class descriptor for a pointer
    /// to a non-empty managed string; falls back to a name built from the
    /// metadata token. Absent only when the method table itself is unusable.
    pub fn get_type_name(&mut self, descriptor: u64) -> Option<String> {
        if let Some(name) = self.type_names.get(&descriptor) {
            return Some(name.clone());
        }

        let table = self.method_table_at(descriptor)?;
        let name = self
            .probe_class_name(table.class)
            .unwrap_or_else(|| table.fallback_name());

        self.type_names.insert(descriptor, name.clone());
        Some(name)
    }

    /// Type name of the object at `object_addr`
    pub fn object_type_name(&mut self, object_addr: u64) -> Option<String> {
        let descriptor = self.method_table_address(object_addr)?;
        self.get_type_name(descriptor)
    }

    fn probe_class_name(&self, class: u64) -> Option<String> {
        if !is_valid_pointer(class) {
            return None;
        }
        self.type_name_offsets.iter().find_map(|offset| {
            let name_ptr = self.reader.read_u64(class + offset).ok()?;
            read_managed_string(self.reader, name_ptr).filter(|name| !name.is_empty())
        })
    }

    pub fn clear_caches(&mut self) {
        self.method_tables.clear();
        self.type_names.clear();
    }

    // ---- heap walking -----------------------------------------------------

    /// Committed read-write regions large enough to hold a managed heap
    pub fn heap_regions(&self) -> Result<Vec<MemoryRegion>> {
        let regions: Vec<MemoryRegion> = self
            .reader
            .regions()?
            .into_iter()
            .filter(|r| r.is_heap_candidate(self.heap_min_region_size))
            .collect();
        debug!(
            "{}Found {} potential managed heap regions",
            self.log.pad(),
            regions.len()
        );
        Ok(regions)
    }

    pub fn is_in_managed_heap(&self, address: u64) -> bool {
        self.heap_regions()
            .map(|regions| regions.iter().any(|r| r.contains(address)))
            .unwrap_or(false)
    }

    pub fn is_in_executable_memory(&self, address: u64) -> bool {
        self.reader
            .regions()
            .map(|regions| {
                regions
                    .iter()
                    .any(|r| r.contains(address) && r.protection.is_executable())
            })
            .unwrap_or(false)
    }

    /// Objects on heap-like regions whose type name contains `type_name`.
    ///
    /// Candidates are tried at every pointer-aligned offset of each region.
    /// Regions are read in bulk; an unreadable region is skipped.
    pub fn find_objects_of_type(&mut self, type_name: &str) -> Result<Vec<u64>> {
        let mut results = Vec::new();
        let _indent = self.log.indent();

        for region in self.heap_regions()? {
            self.cancel.check()?;

            let mut offset = 0u64;
            while offset < region.size {
                let chunk_size = (region.size - offset).min(MAX_TRANSFER_SIZE as u64) as usize;
                let chunk_base = region.base + offset;
                match self.reader.read_bytes(chunk_base, chunk_size) {
                    Ok(buffer) => {
                        self.collect_matches(chunk_base, &buffer, type_name, &mut results)
                    }
                    Err(e) => {
                        debug!(
                            "{}Skipping region 0x{:X}: {}",
                            self.log.pad(),
                            chunk_base,
                            e
                        );
                        break;
                    }
                }
                offset += chunk_size as u64;
            }
        }

        debug!(
            "{}Found {} object(s) of type '{}'",
            self.log.pad(),
            results.len(),
            type_name
        );
        Ok(results)
    }

    fn collect_matches(
        &mut self,
        base: u64,
        buffer: &[u8],
        type_name: &str,
        results: &mut Vec<u64>,
    ) {
        if buffer.len() < OBJECT_PREFIX {
            return;
        }
        let last = buffer.len() - OBJECT_PREFIX;

        for position in (0..=last).step_by(POINTER_SIZE as usize) {
            let object_addr = base + position as u64;
            if !is_valid_pointer(object_addr) {
                continue;
            }

            let header = ObjectHeader {
                sync_block_index: u32::from_le_slice(&buffer[position..]),
            };
            if !header.is_valid() {
                continue;
            }

            let descriptor =
                u64::from_le_slice(&buffer[position + object::METHOD_TABLE_PTR as usize..]);
            if !is_valid_pointer(descriptor) {
                continue;
            }

            if let Some(name) = self.get_type_name(descriptor)
                && name.contains(type_name)
            {
                debug!(
                    "{}Found {} object at 0x{:X}",
                    self.log.pad(),
                    type_name,
                    object_addr
                );
                results.push(object_addr);
            }
        }
    }

    /// Union of the big-integer type searches, sorted and deduplicated
    pub fn scan_for_big_integers(&mut self) -> Result<Vec<u64>> {
        info!("Scanning for BigInteger objects");
        let mut all = Vec::new();
        for pattern in BIG_INTEGER_TYPE_PATTERNS {
            all.extend(self.find_objects_of_type(pattern)?);
        }
        all.sort_unstable();
        all.dedup();
        info!("Found {} BigInteger-related objects", all.len());
        Ok(all)
    }

    pub fn find_game_objects(&mut self) -> Result<Vec<u64>> {
        info!("Searching for GameObject instances");
        self.find_objects_of_type("GameObject")
    }

    pub fn find_mono_behaviours(&mut self) -> Result<Vec<u64>> {
        info!("Searching for MonoBehaviour instances");
        self.find_objects_of_type("MonoBehaviour")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MockMemoryBuilder, MockMemoryReader, Protection};

    // Heap: objects at +0x00 and +0x40
    const HEAP: u64 = 0x100000;
    const TYPES: u64 = 0x200000;
    const BIGINT_MT: u64 = TYPES;
    const OTHER_MT: u64 = TYPES + 0x100;
    const CLASS: u64 = TYPES + 0x200;
    const NAME: u64 = TYPES + 0x300;
    const UNNAMED_MT: u64 = TYPES + 0x400;

    fn fixture() -> MockMemoryReader {
        let bigint_table = MethodTable::sample(CLASS);
        let mut other_table = MethodTable::sample(0);
        other_table.token = 0x7;
        let unnamed = MethodTable::sample(0);

        MockMemoryBuilder::new()
            .base(HEAP)
            .size(0x10000)
            .with_u32(0x00, 0)
            .with_u64(0x04, BIGINT_MT)
            .with_u32(0x40, 0)
            .with_u64(0x44, OTHER_MT)
            .base(TYPES)
            .with_bytes(0x000, &bigint_table.to_bytes())
            .with_bytes(0x100, &other_table.to_bytes())
            // Class descriptor: nothing at +0x10, name pointer at +0x18
            .with_u64(0x200 + 0x18, NAME)
            .with_managed_string(0x300 + 12, "ObscuredBigInteger")
            .with_bytes(0x400, &unnamed.to_bytes())
            .size(0x1000)
            .with_region(MemoryRegion::new(HEAP, 0x10000, Protection::READ_WRITE, "PRIVATE"))
            .with_region(MemoryRegion::new(TYPES, 0x1000, Protection::READ_WRITE, "PRIVATE"))
            .build()
    }

    #[test]
    fn test_valid_object() {
        let reader = fixture();
        let mut classifier = RuntimeClassifier::new(&reader);

        assert!(classifier.is_valid_object(HEAP));
        assert!(!classifier.is_valid_object(HEAP + 0x20));
        assert!(!classifier.is_valid_object(0));
    }

    #[test]
    fn test_method_table_is_cached_by_descriptor() {
        let reader = fixture();
        let mut classifier = RuntimeClassifier::new(&reader);

        let table = classifier.get_method_table(HEAP).unwrap();
        assert_eq!(table.class, CLASS);
        assert_eq!(classifier.cached_method_table(BIGINT_MT), Some(&table));

        // Corrupt the descriptor in memory: the cache still answers
        reader.write_bytes(BIGINT_MT + 4, &0x2000u32.to_le_bytes()).unwrap();
        assert_eq!(classifier.get_method_table(HEAP), Some(table));

        classifier.clear_caches();
        assert!(classifier.cached_method_table(BIGINT_MT).is_none());
        assert!(classifier.get_method_table(HEAP).is_none());
    }

    #[test]
    fn test_type_name_probes_offsets() {
        let reader = fixture();
        let mut classifier = RuntimeClassifier::new(&reader);

        assert_eq!(
            classifier.get_type_name(BIGINT_MT).as_deref(),
            Some("ObscuredBigInteger")
        );
        assert_eq!(
            classifier.object_type_name(HEAP).as_deref(),
            Some("ObscuredBigInteger")
        );
    }

    #[test]
    fn test_type_name_falls_back_to_token() {
        let reader = fixture();
        let mut classifier = RuntimeClassifier::new(&reader);

        assert_eq!(
            classifier.get_type_name(OTHER_MT).as_deref(),
            Some("UnknownType_0x7")
        );
        assert_eq!(
            classifier.get_type_name(UNNAMED_MT).as_deref(),
            Some("UnknownType_0x42")
        );
        assert!(classifier.get_type_name(0).is_none());
    }

    #[test]
    fn test_custom_offsets_can_miss_the_name() {
        let reader = fixture();
        let config = DotNetConfig {
            type_name_offsets: vec![0x10],
            ..DotNetConfig::default()
        };
        let mut classifier = RuntimeClassifier::new(&reader).with_config(&config);

        assert_eq!(
            classifier.get_type_name(BIGINT_MT).as_deref(),
            Some("UnknownType_0x42")
        );
    }

    #[test]
    fn test_find_objects_of_type() {
        let reader = fixture();
        let mut classifier = RuntimeClassifier::new(&reader);

        assert_eq!(classifier.find_objects_of_type("BigInteger").unwrap(), vec![HEAP]);
        assert_eq!(
            classifier.find_objects_of_type("UnknownType_0x7").unwrap(),
            vec![HEAP + 0x40]
        );
        assert!(classifier.find_game_objects().unwrap().is_empty());
    }

    #[test]
    fn test_scan_for_big_integers_dedups() {
        let reader = fixture();
        let mut classifier = RuntimeClassifier::new(&reader);

        // Matches "BigInteger" and "ObscuredBigInteger" but is reported once
        assert_eq!(classifier.scan_for_big_integers().unwrap(), vec![HEAP]);
    }

    #[test]
    fn test_heap_regions_filter_small_regions() {
        let reader = fixture();
        let classifier = RuntimeClassifier::new(&reader);

        let regions = classifier.heap_regions().unwrap();
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].base, HEAP);
        assert!(classifier.is_in_managed_heap(HEAP + 0x100));
        assert!(!classifier.is_in_managed_heap(TYPES));
        assert!(!classifier.is_in_executable_memory(HEAP));
    }

    #[test]
    fn test_cancelled_walk() {
        let reader = fixture();
        let token = CancelToken::new();
        token.cancel();
        let mut classifier = RuntimeClassifier::new(&reader).with_cancel_token(token);

        assert!(classifier.find_objects_of_type("BigInteger").is_err());
    }
}
