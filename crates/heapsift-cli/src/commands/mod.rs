//! CLI command implementations.
//!
//! This module contains the implementation of each CLI command.

pub mod bigint;
pub mod chain;
pub mod common;
pub mod hex_utils;
pub mod hexdump;
pub mod pattern;
pub mod read;
pub mod regions;
pub mod sift;
pub mod types;
