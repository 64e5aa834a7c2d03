use std::io::stdout;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::ArgMatches;

use anicache_core::utils::get_default_store_path;
use anicache_store::{CacheStore, dump_store, dump_store_to_path};

fn open_store(matches: &ArgMatches) -> Result<CacheStore> {
    let db = matches
        .get_one::<String>("db")
        .map(PathBuf::from)
        .unwrap_or_else(get_default_store_path);
    CacheStore::open_read_only(&db)
        .with_context(|| format!("Failed to open cache store: {}", db.display()))
}

pub fn run_dump(matches: &ArgMatches) -> Result<()> {
    let store = open_store(matches)?;
    let delimiter = matches
        .get_one::<String>("format")
        .map(|format| if format == "TSV" { b'\t' } else { b',' });

    match matches.get_one::<String>("output") {
        Some(output) => {
            log::info!("Writing database to {}.", output);
            dump_store_to_path(&store, output, delimiter)
                .with_context(|| format!("Failed to write output file: {}", output))?;
        }
        None => {
            let count = dump_store(&store, stdout().lock(), delimiter.unwrap_or(b','))?;
            log::info!("Wrote {} records.", count);
        }
    }
    Ok(())
}

pub fn run_stats(matches: &ArgMatches) -> Result<()> {
    let store = open_store(matches)?;
    println!("{}", store.stats()?);
    Ok(())
}
