//! Masked byte-pattern scan over every readable region.

use std::cell::Cell;

use anyhow::Result;
use heapsift_core::{CancelToken, MemoryReader, parse_pattern};
use serde::Serialize;
use tracing::debug;

use crate::app::GlobalOptions;
use crate::commands::common::{attach, load_config, print_output, scanner_for};
use crate::commands::hex_utils::format_hex_address;
use crate::shutdown;

#[derive(Debug, Serialize)]
struct PatternOutput {
    pattern: String,
    total: usize,
    matches: Vec<u64>,
}

pub fn run(pattern: &str, limit: usize, opts: &GlobalOptions) -> Result<()> {
    let pattern = parse_pattern(pattern)?;
    let config = load_config(opts)?;
    let process = attach(opts, &config)?;
    let reader = MemoryReader::new(&process);

    let cancel = CancelToken::new();
    shutdown::install(cancel.clone())?;

    let mut scanner = scanner_for(&reader, &config)?.with_cancel_token(cancel);
    let last_percent = Cell::new(0u32);
    scanner.set_progress_callback(move |progress| {
        let percent = (progress * 100.0) as u32;
        if percent >= last_percent.get() + 10 {
            last_percent.set(percent);
            debug!("Scan progress: {}%", percent);
        }
    });

    println!(
        "Scanning {} region(s) for {}",
        scanner.regions().len(),
        pattern
    );
    let matches = scanner.scan(&pattern)?;

    let output = PatternOutput {
        pattern: pattern.to_string(),
        total: matches.len(),
        matches: matches.into_iter().take(limit).collect(),
    };

    print_output(&output, opts, |output| {
        println!("Found {} match(es)", output.total);
        for address in &output.matches {
            println!("  {}", format_hex_address(*address));
        }
        if output.total > output.matches.len() {
            println!("  ... and {} more", output.total - output.matches.len());
        }
    })
}
