//! Region listing.

use anyhow::Result;
use heapsift_core::{MemoryReader, MemoryRegion, ReadMemory, RuntimeClassifier};

use crate::app::GlobalOptions;
use crate::commands::common::{attach, load_config, print_output};

pub fn run(heap_only: bool, opts: &GlobalOptions) -> Result<()> {
    let config = load_config(opts)?;
    let process = attach(opts, &config)?;
    let reader = MemoryReader::new(&process);

    let regions = if heap_only {
        RuntimeClassifier::new(&reader)
            .with_config(&config.dotnet)
            .heap_regions()?
    } else {
        reader.regions()?
    };

    print_output(&regions, opts, |regions: &Vec<MemoryRegion>| {
        let total: u64 = regions.iter().map(|r| r.size).sum();
        for region in regions {
            println!("{}", region);
        }
        println!();
        println!(
            "{} region(s), {:.1} MiB",
            regions.len(),
            total as f64 / (1024.0 * 1024.0)
        );
    })
}
