use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commands::hex_utils::parse_hex_address;

/// heapsift - locate and decrypt obscured big integers in a running process
#[derive(Debug, Parser)]
#[command(name = "heapsift", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOptions,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared across all subcommands.
#[derive(Debug, Args)]
pub struct GlobalOptions {
    /// Target process name (defaults to the configured name).
    #[arg(short, long, global = true, conflicts_with = "pid")]
    pub process: Option<String>,

    /// Attach to this process ID instead of searching by name.
    #[arg(long, global = true)]
    pub pid: Option<u32>,

    /// Configuration file (JSON).
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Emit output as JSON instead of human-readable text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full pipeline: find containers, read and decrypt them.
    Sift {
        /// Also write the report to this JSON file.
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Read one obscured big integer field by field and decrypt it.
    Read {
        /// Container address (hex).
        #[arg(value_parser = parse_hex_address)]
        address: u64,
    },

    /// Read one standard big integer field by field.
    Bigint {
        /// Value address (hex).
        #[arg(value_parser = parse_hex_address)]
        address: u64,
    },

    /// Scan all readable regions for a byte pattern (`??` is a wildcard).
    Pattern {
        /// Pattern such as "DE AD ?? EF".
        pattern: String,

        /// Maximum number of matches to print.
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },

    /// Find heap objects whose type name contains NAME.
    Types {
        /// Type name substring.
        name: String,

        /// Maximum number of objects to print.
        #[arg(short, long, default_value_t = 100)]
        limit: usize,
    },

    /// List memory regions of the target.
    Regions {
        /// Only regions that may hold a managed heap.
        #[arg(long)]
        heap: bool,
    },

    /// Dump raw bytes at an address.
    Hexdump {
        /// Start address (hex).
        #[arg(value_parser = parse_hex_address)]
        address: u64,

        /// Number of bytes to dump.
        #[arg(short, long, default_value_t = 256)]
        size: usize,

        /// Hide the ASCII column.
        #[arg(long)]
        no_ascii: bool,
    },

    /// Follow a pointer chain from BASE through each offset.
    Chain {
        /// Base address (hex).
        #[arg(value_parser = parse_hex_address)]
        base: u64,

        /// Offsets added before each dereference (hex).
        #[arg(value_parser = parse_hex_address, required = true)]
        offsets: Vec<u64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_chain() {
        let cli = Cli::parse_from(["heapsift", "--pid", "42", "chain", "0x1000", "10", "0x20"]);
        assert_eq!(cli.global.pid, Some(42));
        match cli.command {
            Command::Chain { base, offsets } => {
                assert_eq!(base, 0x1000);
                assert_eq!(offsets, vec![0x10, 0x20]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_process_and_pid_conflict() {
        let result = Cli::try_parse_from(["heapsift", "-p", "a.exe", "--pid", "1", "regions"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_address_rejected() {
        assert!(Cli::try_parse_from(["heapsift", "read", "xyz"]).is_err());
    }
}
