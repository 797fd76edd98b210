//! End-to-end pipeline: locate containers, read them, decrypt the hidden values

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::bigint::{BigIntegerContents, ObscuredBigIntegerData, ObscuredBigIntegerReader};
use crate::config::Config;
use crate::crypto::{DecryptionEngine, DecryptionMethod, EncryptedBigInteger};
use crate::dotnet::RuntimeClassifier;
use crate::error::Result;
use crate::logging::LogContext;
use crate::memory::ReadMemory;
use crate::memory::layout::{obscured, object};
use crate::scan::{CancelToken, MemoryScanner};

/// One container and what could be recovered from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub container: u64,
    /// Words pointer of the hidden value
    pub value_ptr: u64,
    pub key_ptr: u64,
    pub key: u32,
    pub decrypted: bool,
    pub decimal: Option<String>,
    pub hex: Option<String>,
    pub sign: Option<i32>,
    pub words: Vec<u32>,
    /// Decoy is active and disagrees with the decrypted value
    pub decoy_mismatch: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiftReport {
    pub timestamp: DateTime<Local>,
    pub method: DecryptionMethod,
    /// Container addresses examined
    pub scanned: usize,
    /// Containers whose obscured layout could not be read
    pub unreadable: usize,
    pub decrypted: usize,
    pub failed: usize,
    pub candidates: Vec<Candidate>,
}

impl SiftReport {
    /// Write the report as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        info!("Saved sift report to {:?}", path.as_ref());
        Ok(())
    }
}

pub struct Sifter<'a, R: ReadMemory> {
    reader: &'a R,
    config: Config,
    engine: DecryptionEngine,
    cancel: CancelToken,
    log: LogContext,
}

impl<'a, R: ReadMemory> Sifter<'a, R> {
    /// Fails when the configured decryption method is unknown
    pub fn new(reader: &'a R, config: Config) -> Result<Self> {
        let engine = DecryptionEngine::with_method(config.decryption.method()?);
        Ok(Self {
            reader,
            config,
            engine,
            cancel: CancelToken::new(),
            log: LogContext::new(),
        })
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_log(mut self, log: LogContext) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &DecryptionEngine {
        &self.engine
    }

    /// Scanner over every region of the target, configured from `config`
    pub fn scanner(&self) -> Result<MemoryScanner<'a, R>> {
        let mut scanner = MemoryScanner::new(self.reader)
            .with_log(self.log.clone())
            .with_cancel_token(self.cancel.clone());
        scanner.set_regions(self.reader.regions()?);
        scanner.configure(&self.config.memory_scanning)?;
        Ok(scanner)
    }

    /// Container addresses from signature hits and from typed heap objects
    pub fn find_candidates(&self) -> Result<Vec<u64>> {
        let scanner = self.scanner()?;
        self.collect_candidates(&scanner)
    }

    fn collect_candidates(&self, scanner: &MemoryScanner<'a, R>) -> Result<Vec<u64>> {
        let mut containers = BTreeSet::new();

        for (name, pattern) in scanner.signatures() {
            let hits = scanner.scan(pattern)?;
            info!("Signature '{}' matched {} address(es)", name, hits.len());
            containers.extend(hits);
        }

        let mut classifier = RuntimeClassifier::new(self.reader)
            .with_config(&self.config.dotnet)
            .with_log(self.log.clone())
            .with_cancel_token(self.cancel.clone());
        for type_name in &self.config.dotnet.type_patterns {
            let objects = classifier.find_objects_of_type(type_name)?;
            info!("Found {} '{}' object(s)", objects.len(), type_name);
            containers.extend(objects.into_iter().map(|addr| addr + object::DATA));
        }

        Ok(containers.into_iter().collect())
    }

    /// Run the whole pipeline once
    pub fn sift(&mut self) -> Result<SiftReport> {
        let scanner = self.scanner()?;
        let containers = self.collect_candidates(&scanner)?;
        info!("Examining {} candidate container(s)", containers.len());

        let reader = ObscuredBigIntegerReader::new(&scanner).with_log(self.log.clone());
        let mut read: Vec<ObscuredBigIntegerData> = Vec::new();
        let mut items: Vec<EncryptedBigInteger> = Vec::new();
        let mut unreadable = 0;

        for &container in &containers {
            self.cancel.check()?;
            let Some(data) = reader.read_obscured_big_integer(container) else {
                debug!("Container 0x{:X} is not an obscured value", container);
                unreadable += 1;
                continue;
            };
            items.push(EncryptedBigInteger {
                container,
                value_ptr: data.hidden.raw.words_ptr,
                key_ptr: container + obscured::CRYPTO_KEY,
                encrypted: data.hidden.raw.to_bytes(),
                key: data.key.to_le_bytes().to_vec(),
                decrypted: None,
            });
            read.push(data);
        }

        self.engine.reset_statistics();
        self.engine.decrypt_multiple(&mut items);

        let candidates: Vec<Candidate> = items
            .into_iter()
            .zip(&read)
            .map(|(item, data)| candidate_from(item, data))
            .collect();

        let mismatched = candidates.iter().filter(|c| c.decoy_mismatch).count();
        if mismatched > 0 {
            warn!("{} value(s) disagree with their decoy", mismatched);
        }
        info!(
            "Decrypted {} of {} container(s), {} failed, {} unreadable",
            self.engine.successful(),
            containers.len(),
            self.engine.failed(),
            unreadable
        );

        Ok(SiftReport {
            timestamp: Local::now(),
            method: self.engine.method(),
            scanned: containers.len(),
            unreadable,
            decrypted: self.engine.successful(),
            failed: self.engine.failed(),
            candidates,
        })
    }
}

fn candidate_from(item: EncryptedBigInteger, data: &ObscuredBigIntegerData) -> Candidate {
    let value = item
        .decrypted
        .as_deref()
        .and_then(|bytes| BigIntegerContents::from_bytes(item.value_ptr, bytes))
        .map(BigIntegerContents::into_big_integer);

    let mut candidate = Candidate {
        container: item.container,
        value_ptr: item.value_ptr,
        key_ptr: item.key_ptr,
        key: data.key,
        decrypted: false,
        decimal: None,
        hex: None,
        sign: None,
        words: Vec::new(),
        decoy_mismatch: false,
    };
    if let Some(value) = value {
        candidate.decrypted = true;
        candidate.decimal = Some(value.to_string());
        candidate.hex = Some(value.to_hex());
        candidate.sign = Some(value.sign);
        candidate.decoy_mismatch = !data.decoy_matches(&value);
        candidate.words = value.words;
    }
    candidate
}
