//! Hexdump command implementation.
//!
//! Displays raw memory bytes in traditional hexdump format, useful for
//! inspecting object headers and big-integer words.
//!
//! # Output Format
//!
//! ```text
//! 0x00007FF612340000: 48 65 6C 6C 6F 20 57 6F  72 6C 64 00 00 00 00 00  |Hello World.....|
//! ```

use anyhow::Result;
use heapsift_core::{MemoryReader, ReadMemory};
use serde::Serialize;

use crate::app::GlobalOptions;
use crate::commands::common::{attach, load_config, print_output};

const ROW: usize = 16;

#[derive(Debug, Serialize)]
struct DumpOutput {
    address: u64,
    bytes: Vec<u8>,
}

/// Run the hexdump command
pub fn run(address: u64, size: usize, ascii: bool, opts: &GlobalOptions) -> Result<()> {
    let config = load_config(opts)?;
    let process = attach(opts, &config)?;
    let reader = MemoryReader::new(&process);
    let bytes = reader.read_bytes(address, size)?;

    let output = DumpOutput { address, bytes };
    print_output(&output, opts, |output| {
        println!(
            "Hexdump at 0x{:X} ({} bytes):",
            output.address,
            output.bytes.len()
        );
        println!();
        for line in format_rows(output.address, &output.bytes, ascii) {
            println!("{}", line);
        }
    })
}

/// One line per 16 bytes, with an optional ASCII column
pub fn format_rows(address: u64, bytes: &[u8], ascii: bool) -> Vec<String> {
    bytes
        .chunks(ROW)
        .enumerate()
        .map(|(i, chunk)| {
            let mut line = format!("0x{:016X}: ", address + (i * ROW) as u64);

            for j in 0..ROW {
                if j == 8 {
                    line.push(' ');
                }
                match chunk.get(j) {
                    Some(byte) => line.push_str(&format!("{:02X} ", byte)),
                    None => line.push_str("   "),
                }
            }

            if ascii {
                line.push_str(" |");
                for byte in chunk {
                    if (0x20..0x7F).contains(byte) {
                        line.push(*byte as char);
                    } else {
                        line.push('.');
                    }
                }
                for _ in chunk.len()..ROW {
                    line.push(' ');
                }
                line.push('|');
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_row() {
        let rows = format_rows(0x1000, b"Hello World\0\0\0\0\0", true);
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0],
            "0x0000000000001000: 48 65 6C 6C 6F 20 57 6F  72 6C 64 00 00 00 00 00  |Hello World.....|"
        );
    }

    #[test]
    fn test_partial_row_is_padded() {
        let rows = format_rows(0x1000, &[0xAB; 20], false);
        assert_eq!(rows.len(), 2);
        assert!(rows[1].starts_with("0x0000000000001010: AB AB AB AB "));
        assert_eq!(rows[0].len(), rows[1].len());
    }

    #[test]
    fn test_empty() {
        assert!(format_rows(0, &[], true).is_empty());
    }
}
