//! Full pipeline: candidates, obscured reads, decryption, report.

use std::path::Path;

use anyhow::Result;
use heapsift_core::{CancelToken, Candidate, MemoryReader, SiftReport, Sifter};
use owo_colors::OwoColorize;

use crate::app::GlobalOptions;
use crate::commands::common::{attach, load_config, print_output};
use crate::commands::hex_utils::format_hex_address;
use crate::shutdown;

pub fn run(output: Option<&Path>, opts: &GlobalOptions) -> Result<()> {
    let config = load_config(opts)?;
    let process = attach(opts, &config)?;
    let reader = MemoryReader::new(&process);

    let cancel = CancelToken::new();
    shutdown::install(cancel.clone())?;

    let mut sifter = Sifter::new(&reader, config)?.with_cancel_token(cancel);
    let report = sifter.sift()?;

    if let Some(path) = output {
        report.save(path)?;
    }

    print_output(&report, opts, print_report)
}

fn print_report(report: &SiftReport) {
    println!(
        "{} candidate(s) examined, {} decrypted, {} failed, {} unreadable ({})",
        report.scanned,
        report.decrypted.green(),
        report.failed.red(),
        report.unreadable,
        report.method
    );
    println!();

    for candidate in &report.candidates {
        print_candidate(candidate);
    }
}

fn print_candidate(candidate: &Candidate) {
    println!(
        "{} value {} key {} (0x{:08X})",
        format_hex_address(candidate.container).bold(),
        format_hex_address(candidate.value_ptr),
        format_hex_address(candidate.key_ptr),
        candidate.key
    );

    match (&candidate.decimal, &candidate.hex) {
        (Some(decimal), Some(hex)) if candidate.decrypted => {
            println!("  = {} ({})", decimal.green(), hex.dimmed());
            if candidate.decoy_mismatch {
                println!("  {}", "decoy does not match the decrypted value".yellow());
            }
        }
        _ => println!("  {}", "DECRYPTION_FAILED".red()),
    }
}
