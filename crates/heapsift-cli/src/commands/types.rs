//! Heap search for objects by type name.

use anyhow::Result;
use heapsift_core::{CancelToken, MemoryReader, RuntimeClassifier};
use serde::Serialize;

use crate::app::GlobalOptions;
use crate::commands::common::{attach, load_config, print_output};
use crate::commands::hex_utils::format_hex_address;
use crate::shutdown;

#[derive(Debug, Serialize)]
struct ObjectEntry {
    address: u64,
    method_table: Option<u64>,
    type_name: Option<String>,
}

#[derive(Debug, Serialize)]
struct TypesOutput {
    query: String,
    total: usize,
    objects: Vec<ObjectEntry>,
}

pub fn run(name: &str, limit: usize, opts: &GlobalOptions) -> Result<()> {
    let config = load_config(opts)?;
    let process = attach(opts, &config)?;
    let reader = MemoryReader::new(&process);

    let cancel = CancelToken::new();
    shutdown::install(cancel.clone())?;

    let mut classifier = RuntimeClassifier::new(&reader)
        .with_config(&config.dotnet)
        .with_cancel_token(cancel);
    let found = classifier.find_objects_of_type(name)?;

    let objects = found
        .iter()
        .take(limit)
        .map(|&address| ObjectEntry {
            address,
            method_table: classifier.method_table_address(address),
            type_name: classifier.object_type_name(address),
        })
        .collect();
    let output = TypesOutput {
        query: name.to_string(),
        total: found.len(),
        objects,
    };

    print_output(&output, opts, |output| {
        println!("Found {} object(s) matching '{}'", output.total, output.query);
        for object in &output.objects {
            println!(
                "  {}  MT {}  {}",
                format_hex_address(object.address),
                object
                    .method_table
                    .map(format_hex_address)
                    .unwrap_or_else(|| "?".to_string()),
                object.type_name.as_deref().unwrap_or("?")
            );
        }
    })
}
