//! JSON configuration
//!
//! Every section is optional; missing sections and fields take their
//! defaults, so `{}` is a valid configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto::DecryptionMethod;
use crate::error::{Error, Result};
use crate::memory::layout::{DEFAULT_TYPE_NAME_OFFSETS, heap};
use crate::memory::{DEFAULT_PROCESS_NAME, MAX_TRANSFER_SIZE};
use crate::scan::{Pattern, parse_pattern};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub target: TargetConfig,
    pub memory_scanning: MemoryScanningConfig,
    pub dotnet: DotNetConfig,
    pub decryption: DecryptionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    pub process_name: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            process_name: DEFAULT_PROCESS_NAME.to_string(),
        }
    }
}

/// Signature entry: a bare pattern string or `{ "pattern": "..." }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignatureEntry {
    Pattern(String),
    Detailed { pattern: String },
}

impl SignatureEntry {
    pub fn pattern(&self) -> &str {
        match self {
            SignatureEntry::Pattern(pattern) | SignatureEntry::Detailed { pattern } => pattern,
        }
    }

    pub fn parse(&self) -> Result<Pattern> {
        parse_pattern(self.pattern())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryScanningConfig {
    pub signatures: BTreeMap<String, SignatureEntry>,
    /// Largest read issued for one region
    pub max_read_size: usize,
    /// Stride of candidate match offsets
    pub alignment: usize,
}

impl Default for MemoryScanningConfig {
    fn default() -> Self {
        Self {
            signatures: BTreeMap::new(),
            max_read_size: MAX_TRANSFER_SIZE,
            alignment: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DotNetConfig {
    /// Offsets probed from the class descriptor for a type name pointer
    pub type_name_offsets: Vec<u64>,
    pub heap_min_region_size: u64,
    /// Type name substrings searched by the sift pipeline
    pub type_patterns: Vec<String>,
}

impl Default for DotNetConfig {
    fn default() -> Self {
        Self {
            type_name_offsets: DEFAULT_TYPE_NAME_OFFSETS.to_vec(),
            heap_min_region_size: heap::MIN_REGION_SIZE,
            type_patterns: vec!["ObscuredBigInteger".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecryptionConfig {
    pub method: String,
}

impl Default for DecryptionConfig {
    fn default() -> Self {
        Self {
            method: DecryptionMethod::default().to_string(),
        }
    }
}

impl DecryptionConfig {
    pub fn method(&self) -> Result<DecryptionMethod> {
        DecryptionMethod::from_str(&self.method)
            .map_err(|_| Error::UnsupportedMethod(self.method.clone()))
    }
}

impl Config {
    /// Load and validate a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)?;
        let config = Self::from_json(&content)?;
        debug!(
            "Loaded config from {:?} ({} signatures)",
            path.as_ref(),
            config.memory_scanning.signatures.len()
        );
        Ok(config)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let scanning = &self.memory_scanning;
        if scanning.alignment == 0 {
            return Err(Error::Config("memory_scanning.alignment must be non-zero".into()));
        }
        if scanning.max_read_size == 0 || scanning.max_read_size > MAX_TRANSFER_SIZE {
            return Err(Error::Config(format!(
                "memory_scanning.max_read_size must be in 1..={}",
                MAX_TRANSFER_SIZE
            )));
        }
        for (name, entry) in &scanning.signatures {
            entry
                .parse()
                .map_err(|e| Error::Config(format!("signature '{}': {}", name, e)))?;
        }
        if self.dotnet.type_name_offsets.is_empty() {
            return Err(Error::Config("dotnet.type_name_offsets is empty".into()));
        }
        self.decryption.method()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FailureStage;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.target.process_name, "Revolution Idol.exe");
        assert_eq!(config.dotnet.type_name_offsets, vec![0x10, 0x18, 0x20, 0x28, 0x30]);
        assert_eq!(
            config.decryption.method().unwrap(),
            DecryptionMethod::SymmetricShuffle
        );
    }

    #[test]
    fn test_signature_entry_forms() {
        let config = Config::from_json(
            r#"{
                "memory_scanning": {
                    "signatures": {
                        "bare": "DE AD ?? EF",
                        "detailed": { "pattern": "48 8B ?? ??" }
                    }
                }
            }"#,
        )
        .unwrap();

        let signatures = &config.memory_scanning.signatures;
        assert_eq!(signatures["bare"].pattern(), "DE AD ?? EF");
        assert_eq!(signatures["detailed"].pattern(), "48 8B ?? ??");
        assert_eq!(signatures["bare"].parse().unwrap().mask, vec![1, 1, 0, 1]);
    }

    #[test]
    fn test_invalid_signature_is_configuration_error() {
        let err = Config::from_json(r#"{"memory_scanning":{"signatures":{"x":"ZZ"}}}"#)
            .unwrap_err();
        assert_eq!(err.stage(), FailureStage::Configuration);
    }

    #[test]
    fn test_unknown_method_rejected() {
        let err = Config::from_json(r#"{"decryption":{"method":"aes"}}"#).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMethod(ref m) if m == "aes"));

        let config = Config::from_json(r#"{"decryption":{"method":"xor"}}"#).unwrap();
        assert_eq!(config.decryption.method().unwrap(), DecryptionMethod::Xor);
    }

    #[test]
    fn test_zero_alignment_rejected() {
        assert!(Config::from_json(r#"{"memory_scanning":{"alignment":0}}"#).is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heapsift.json");

        let mut config = Config::default();
        config.target.process_name = "Revolution Idol.exe".to_string();
        config
            .memory_scanning
            .signatures
            .insert("marker".to_string(), SignatureEntry::Pattern("DE AD BE EF".into()));
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(dir.path().join("missing.json")).unwrap_err();
        assert!(err.is_not_found());
    }
}
