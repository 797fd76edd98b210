use std::path::Path;

use anyhow::Result;
use heapsift_core::{Config, MemoryScanner, ProcessHandle, ReadMemory};
use serde::Serialize;
use tracing::{info, warn};

use crate::app::GlobalOptions;

/// Looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "heapsift.json";

/// Load the configuration.
///
/// A missing default file falls back to defaults; an explicit path must load.
pub fn load_config(opts: &GlobalOptions) -> Result<Config> {
    let (path, explicit) = match &opts.config {
        Some(path) => (path.as_path(), true),
        None => (Path::new(DEFAULT_CONFIG_FILE), false),
    };

    match Config::load(path) {
        Ok(config) => {
            info!("Loaded config from {:?}", path);
            Ok(config)
        }
        Err(e) if !explicit && e.is_not_found() => {
            warn!("No config at {:?}, using defaults", path);
            Ok(Config::default())
        }
        Err(e) => Err(e.into()),
    }
}

/// Attach by `--pid`, or by `--process` / the configured process name.
pub fn attach(opts: &GlobalOptions, config: &Config) -> Result<ProcessHandle> {
    let process = match opts.pid {
        Some(pid) => ProcessHandle::open(pid)?,
        None => {
            let name = opts
                .process
                .as_deref()
                .unwrap_or(&config.target.process_name);
            ProcessHandle::open_by_name(name)?
        }
    };
    info!(
        "Attached to {} (PID: {}, access: {})",
        process.name(),
        process.pid(),
        process.access()
    );
    Ok(process)
}

/// Scanner over every region of the target, configured from `config`
pub fn scanner_for<'a, R: ReadMemory>(
    reader: &'a R,
    config: &Config,
) -> Result<MemoryScanner<'a, R>> {
    let mut scanner = MemoryScanner::new(reader);
    scanner.set_regions(reader.regions()?);
    scanner.configure(&config.memory_scanning)?;
    Ok(scanner)
}

/// Print `data` as JSON (if `--json`) or call `display_fn` for human-readable output.
pub fn print_output<T: Serialize>(
    data: &T,
    opts: &GlobalOptions,
    display_fn: impl FnOnce(&T),
) -> Result<()> {
    if opts.json {
        let json = serde_json::to_string_pretty(data)?;
        println!("{json}");
    } else {
        display_fn(data);
    }
    Ok(())
}
