use std::env;
use std::fs::{File, read_dir};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use flate2::read::MultiGzDecoder;

use crate::consts::{ANICACHE_DB_ENV, DEFAULT_CACHE_FOLDER, DEFAULT_STORE_FILE};

///
/// Get a reader for either a gzip'd or non-gzip'd file.
///
/// Compression is detected from the gzip magic bytes rather than the file
/// extension, so renamed files still read correctly.
///
/// # Arguments
///
/// - path: path to the file to read
///
pub fn get_dynamic_reader(path: &Path) -> Result<BufReader<Box<dyn Read>>> {
    let file = File::open(path).with_context(|| format!("Failed to open file: {:?}", path))?;
    let mut peek = BufReader::new(file);
    let is_gzipped = {
        let head = peek
            .fill_buf()
            .with_context(|| format!("Failed to read file: {:?}", path))?;
        head.len() >= 2 && head[0] == 0x1f && head[1] == 0x8b
    };

    let inner: Box<dyn Read> = match is_gzipped {
        true => Box::new(MultiGzDecoder::new(peek)),
        false => Box::new(peek),
    };

    Ok(BufReader::new(inner))
}

///
/// Get the default store path from the environment, falling back to
/// `~/.anicache/ani_cache.db`.
///
pub fn get_default_store_path() -> PathBuf {
    if let Ok(val) = env::var(ANICACHE_DB_ENV) {
        return PathBuf::from(val);
    }
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
    home.join(DEFAULT_CACHE_FOLDER).join(DEFAULT_STORE_FILE)
}

///
/// Collect genome files from either a list file or a directory.
///
/// A list file holds one genome per line; only the first tab-separated
/// column is used. A directory is scanned (not recursively) for files
/// whose name ends with `file_ext`. Results come back sorted.
///
/// # Arguments
///
/// - input: list file or directory
/// - file_ext: extension used to pick files out of a directory
/// - validate: check that every listed file exists
///
pub fn collect_genome_paths(input: &Path, file_ext: &str, validate: bool) -> Result<Vec<PathBuf>> {
    let mut genome_paths = Vec::new();

    if input.is_file() {
        let reader = BufReader::new(
            File::open(input).with_context(|| format!("Failed to open genome list: {:?}", input))?,
        );
        for line in reader.lines() {
            let line = line?;
            let Some(first) = line.trim().split('\t').next() else {
                continue;
            };
            if first.is_empty() {
                continue;
            }
            let path = PathBuf::from(first);
            if validate && !path.exists() {
                bail!("Specified input file does not exist: {}", path.display());
            }
            genome_paths.push(path);
        }
        if genome_paths.is_empty() {
            bail!(
                "No genomes found in file: {}. Check that the file has the correct format.",
                input.display()
            );
        }
    } else if input.is_dir() {
        for entry in read_dir(input).with_context(|| format!("Failed to read directory: {:?}", input))? {
            let path = entry?.path();
            let matches_ext = path
                .file_name()
                .map(|name| name.to_string_lossy().ends_with(file_ext))
                .unwrap_or(false);
            if path.is_file() && matches_ext {
                genome_paths.push(path);
            }
        }
        if genome_paths.is_empty() {
            bail!(
                "No genomes found in directory: {}. Check the file extension used to identify genomes.",
                input.display()
            );
        }
    } else {
        bail!(
            "Specified input file or directory does not exist: {}",
            input.display()
        );
    }

    genome_paths.sort();
    Ok(genome_paths)
}
