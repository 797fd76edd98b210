//! Verbose read of one standard big integer.

use anyhow::{Result, bail};
use heapsift_core::{BigIntegerReader, DotNetBigIntegerData, LogContext, MemoryReader};

use crate::app::GlobalOptions;
use crate::commands::common::{attach, load_config, print_output, scanner_for};

pub fn run(address: u64, opts: &GlobalOptions) -> Result<()> {
    let config = load_config(opts)?;
    let process = attach(opts, &config)?;
    let reader = MemoryReader::new(&process);
    let scanner = scanner_for(&reader, &config)?;

    let bigint = BigIntegerReader::new(&scanner).with_log(LogContext::new());
    let Some(value) = bigint.read_big_integer_verbose(address) else {
        bail!("No big integer at 0x{:X}", address);
    };

    print_output(&value, opts, |value: &DotNetBigIntegerData| {
        println!("sign:   {}", value.sign);
        println!("words:  {} at 0x{:X}", value.len(), value.words_ptr);
        println!("value:  {}", value);
        println!("hex:    {}", value.to_hex());
    })
}
