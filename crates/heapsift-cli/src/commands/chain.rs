//! Pointer chain following.

use anyhow::Result;
use heapsift_core::{MemoryReader, MemoryScanner};
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::app::GlobalOptions;
use crate::commands::common::{attach, load_config, print_output};
use crate::commands::hex_utils::format_hex_address;

#[derive(Debug, Serialize)]
struct ChainOutput {
    base: u64,
    offsets: Vec<u64>,
    /// Pointer read after each offset, stopping at the first failed read
    resolved: Vec<u64>,
    complete: bool,
}

pub fn run(base: u64, offsets: &[u64], opts: &GlobalOptions) -> Result<()> {
    let config = load_config(opts)?;
    let process = attach(opts, &config)?;
    let reader = MemoryReader::new(&process);
    let scanner = MemoryScanner::new(&reader);

    let resolved = scanner.follow_pointer_chain(base, offsets);
    let output = ChainOutput {
        base,
        offsets: offsets.to_vec(),
        complete: resolved.len() == offsets.len(),
        resolved,
    };

    print_output(&output, opts, |output| {
        println!("base {}", format_hex_address(output.base));
        for (i, offset) in output.offsets.iter().enumerate() {
            match output.resolved.get(i) {
                Some(address) => println!(
                    "  +0x{:X} -> {}",
                    offset,
                    format_hex_address(*address).green()
                ),
                None => {
                    println!("  +0x{:X} -> {}", offset, "unreadable".red());
                    break;
                }
            }
        }
    })
}
