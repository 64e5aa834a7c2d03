//! Export a store as delimited text, one row per record.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use anicache_core::errors::{AniCacheError, Result};
use anicache_core::models::{CacheRecord, PairKey};

use crate::store::CacheStore;

#[derive(Serialize)]
struct DumpRow<'a> {
    genome_a: &'a str,
    genome_b: &'a str,
    config_digest: &'a str,
    orientation: &'a str,
    ani: f64,
    af: f64,
    aligned_fragments: u64,
    total_fragments: u64,
    computed_at: String,
    tool: &'a str,
    tool_version: &'a str,
    config_json: String,
}

impl<'a> DumpRow<'a> {
    fn new(key: &'a PairKey, record: &'a CacheRecord) -> Result<Self> {
        Ok(DumpRow {
            genome_a: key.genome_a.as_str(),
            genome_b: key.genome_b.as_str(),
            config_digest: &key.config_digest,
            orientation: key.orientation.as_str(),
            ani: record.ani,
            af: record.aligned_fraction,
            aligned_fragments: record.aligned_fragments,
            total_fragments: record.total_fragments,
            computed_at: record.computed_at.to_rfc3339(),
            tool: &record.config.tool,
            tool_version: &record.config.tool_version,
            config_json: serde_json::to_string(&record.config)
                .map_err(|e| AniCacheError::InvalidRecord(e.to_string()))?,
        })
    }
}

fn csv_error(e: csv::Error) -> AniCacheError {
    AniCacheError::Io(e.to_string())
}

///
/// Write every record of `store` to `writer` with a header row.
///
/// # Arguments
///
/// - store: the store to export
/// - writer: destination
/// - delimiter: `b','` for CSV, `b'\t'` for TSV
///
/// Returns the number of records written.
///
pub fn dump_store<W: Write>(store: &CacheStore, writer: W, delimiter: u8) -> Result<usize> {
    let records = store.records()?;
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(writer);

    for (key, record) in &records {
        wtr.serialize(DumpRow::new(key, record)?).map_err(csv_error)?;
    }
    // header only, for an empty store
    if records.is_empty() {
        wtr.write_record([
            "genome_a",
            "genome_b",
            "config_digest",
            "orientation",
            "ani",
            "af",
            "aligned_fragments",
            "total_fragments",
            "computed_at",
            "tool",
            "tool_version",
            "config_json",
        ])
        .map_err(csv_error)?;
    }
    wtr.flush()?;
    Ok(records.len())
}

///
/// [dump_store] into a file. Without an explicit `delimiter` it follows the
/// extension: `.tsv` and `.txt` get tabs, anything else commas.
///
pub fn dump_store_to_path<P: AsRef<Path>>(
    store: &CacheStore,
    path: P,
    delimiter: Option<u8>,
) -> Result<usize> {
    let path = path.as_ref();
    let delimiter = delimiter.unwrap_or_else(|| match path.extension().and_then(|e| e.to_str()) {
        Some("tsv") | Some("txt") => b'\t',
        _ => b',',
    });
    let file = File::create(path)?;
    let count = dump_store(store, BufWriter::new(file), delimiter)?;
    log::info!("Wrote {} records to {}", count, path.display());
    Ok(count)
}
