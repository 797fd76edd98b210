//! # heapsift-core
//!
//! Core library for inspecting a running managed-runtime process.
//!
//! This crate provides:
//! - Windows process attachment, memory reads and region enumeration
//! - Masked byte-pattern scanning
//! - Heuristic classification of managed objects by method table and type name
//! - Readers for standard and obscured big integers
//! - Removal of the symmetric shuffle obfuscation
//! - A pipeline tying the stages together into a JSON report

pub mod bigint;
pub mod config;
pub mod crypto;
pub mod dotnet;
pub mod error;
pub mod logging;
pub mod memory;
pub mod scan;
pub mod sifter;

pub use bigint::{
    BigIntegerContents, BigIntegerReader, DotNetBigIntegerData, ObscuredBigIntegerData,
    ObscuredBigIntegerReader, SerializableBigInteger,
};
pub use config::Config;
pub use crypto::{DecryptionEngine, DecryptionMethod, EncryptedBigInteger, symmetric_shuffle};
pub use dotnet::{MethodTable, ObjectHeader, RuntimeClassifier};
pub use error::{Error, FailureStage, Result};
pub use logging::LogContext;
pub use memory::{
    MemoryReader, MemoryRegion, ProcessHandle, ProcessInfo, ReadMemory, is_valid_pointer,
};
pub use scan::{CancelToken, MemoryScanner, Pattern, parse_pattern};
pub use sifter::{Candidate, SiftReport, Sifter};
