use std::io::BufRead;
use std::path::PathBuf;

use fxhash::FxHashMap;
use parking_lot::RwLock;
use rayon::prelude::*;
use serde_json::Value;

use anicache_core::errors::{AniCacheError, Result};
use anicache_core::models::{Genome, GenomeDigest};
use anicache_core::utils::get_dynamic_reader;

use crate::algorithms::{canonicalize_json, sha512t24u};
use crate::fasta::{SequenceDigest, digest_sequences};

///
/// Combine per-sequence digests into one genome digest.
///
/// The digests are sorted first, so the order of records in the file does
/// not matter. Duplicated records are kept: a genome holding two copies of
/// a contig is not the same genome as one holding a single copy.
///
pub fn genome_digest_from_sequences(sequences: &[SequenceDigest]) -> GenomeDigest {
    let mut digests: Vec<&str> = sequences.iter().map(|s| s.sha512t24u.as_str()).collect();
    digests.sort_unstable();

    let array = Value::Array(
        digests
            .iter()
            .map(|d| Value::String(format!("SQ.{}", d)))
            .collect(),
    );
    GenomeDigest::new(sha512t24u(canonicalize_json(&array)))
}

///
/// Fingerprints genomes from their content.
///
/// A resolver is meant to live for one run: every path is hashed at most
/// once and later lookups hit the in-memory table. The table is keyed by
/// path, but the values are content digests, so two paths holding the same
/// genome still resolve to the same digest.
///
#[derive(Default)]
pub struct GenomeResolver {
    seen: RwLock<FxHashMap<PathBuf, GenomeDigest>>,
}

impl GenomeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct paths fingerprinted so far.
    pub fn len(&self) -> usize {
        self.seen.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.read().is_empty()
    }

    ///
    /// Fingerprint the genome file behind `genome`.
    ///
    /// # Errors
    ///
    /// `UnreadableGenome` when the file can't be opened or is not valid
    /// nucleotide FASTA.
    ///
    pub fn fingerprint(&self, genome: &Genome) -> Result<GenomeDigest> {
        if let Some(digest) = self.seen.read().get(&genome.path) {
            return Ok(digest.clone());
        }

        let reader = get_dynamic_reader(&genome.path).map_err(|e| AniCacheError::UnreadableGenome {
            label: genome.label.clone(),
            reason: format!("{:#}", e),
        })?;
        let digest = self.fingerprint_reader(&genome.label, reader)?;

        log::debug!("{} -> {}", genome.label, digest);
        self.seen
            .write()
            .insert(genome.path.clone(), digest.clone());
        Ok(digest)
    }

    ///
    /// Fingerprint FASTA content from any reader. Nothing is remembered.
    ///
    pub fn fingerprint_reader<R: BufRead>(&self, label: &str, reader: R) -> Result<GenomeDigest> {
        let sequences = digest_sequences(reader).map_err(|reason| AniCacheError::UnreadableGenome {
            label: label.to_string(),
            reason,
        })?;
        Ok(genome_digest_from_sequences(&sequences))
    }

    ///
    /// Fingerprint many genomes in parallel. Results come back in input
    /// order, one per genome.
    ///
    pub fn fingerprint_all(&self, genomes: &[Genome]) -> Vec<Result<GenomeDigest>> {
        genomes.par_iter().map(|g| self.fingerprint(g)).collect()
    }
}
