//! Verbose read of one obscured big integer, then decryption.

use anyhow::{Result, bail};
use heapsift_core::{LogContext, MemoryReader, ObscuredBigIntegerData, ObscuredBigIntegerReader};
use owo_colors::OwoColorize;

use crate::app::GlobalOptions;
use crate::commands::common::{attach, load_config, print_output, scanner_for};

pub fn run(address: u64, opts: &GlobalOptions) -> Result<()> {
    let config = load_config(opts)?;
    let process = attach(opts, &config)?;
    let reader = MemoryReader::new(&process);
    let scanner = scanner_for(&reader, &config)?;

    let obscured = ObscuredBigIntegerReader::new(&scanner).with_log(LogContext::new());
    let Some(data) = obscured.read_obscured_big_integer_verbose(address) else {
        bail!("No obscured big integer at 0x{:X}", address);
    };

    print_output(&data, opts, print_data)
}

fn print_data(data: &ObscuredBigIntegerData) {
    println!("key:           0x{:08X}", data.key);
    println!("decoy active:  {}", data.decoy_active);
    println!("inited:        {}", data.inited);
    println!(
        "hidden (raw):  sign {} words {:08X?}",
        data.hidden.raw.sign, data.hidden.raw.words
    );

    match data.decrypt() {
        Some(value) => {
            println!("decrypted:     {} ({})", value.green(), value.to_hex().dimmed());
            if !data.decoy_matches(&value) {
                println!("{}", "decoy does not match the decrypted value".yellow());
            }
        }
        None => println!("decrypted:     {}", data.decrypted_value_to_string().red()),
    }
}
