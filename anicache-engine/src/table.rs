//! Result tables written at the end of a run.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

use anicache_core::errors::{AniCacheError, Result};

use crate::consts::{AF_MATRIX_FILE, ANI_AF_FILE, ANI_MATRIX_FILE};
use crate::scheduler::{ResolveReport, Source};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AniEntry {
    pub ani: f64,
    pub af: f64,
    pub aligned_fragments: u64,
    pub total_fragments: u64,
    pub source: Source,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Ani,
    Af,
}

impl Metric {
    fn of(&self, entry: &AniEntry) -> f64 {
        match self {
            Metric::Ani => entry.ani,
            Metric::Af => entry.af,
        }
    }
}

fn csv_error(e: csv::Error) -> AniCacheError {
    AniCacheError::Io(e.to_string())
}

fn tsv_writer<W: Write>(writer: W) -> csv::Writer<W> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_writer(writer)
}

/// Labels carried by more than one distinct genome path in `report`.
pub(crate) fn colliding_labels(report: &ResolveReport) -> BTreeSet<&str> {
    let mut paths: BTreeMap<&str, &Path> = BTreeMap::new();
    let mut colliding = BTreeSet::new();
    for outcome in &report.outcomes {
        for genome in [&outcome.request.query, &outcome.request.reference] {
            let seen = paths.entry(genome.label.as_str()).or_insert(genome.path.as_path());
            if *seen != genome.path.as_path() {
                colliding.insert(genome.label.as_str());
            }
        }
    }
    colliding
}

///
/// ANI and AF by genome label, query -> reference -> entry.
///
/// Failed pairs are simply absent.
///
#[derive(Debug, Clone, Default)]
pub struct AniTable {
    entries: BTreeMap<String, BTreeMap<String, AniEntry>>,
}

impl AniTable {
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// Build the table from a resolve report. Rows are keyed by genome
    /// label, so two genome files sharing a label overwrite each other; such
    /// labels are logged.
    ///
    pub fn from_report(report: &ResolveReport) -> Self {
        for label in colliding_labels(report) {
            log::warn!(
                "Several genome files are labelled {}; their rows overwrite each other in {}",
                label,
                ANI_AF_FILE
            );
        }
        let mut table = AniTable::new();
        for outcome in &report.outcomes {
            if let Ok(resolved) = &outcome.result {
                let record = &resolved.record;
                table.insert(
                    &outcome.request.query.label,
                    &outcome.request.reference.label,
                    AniEntry {
                        ani: record.ani,
                        af: record.aligned_fraction,
                        aligned_fragments: record.aligned_fragments,
                        total_fragments: record.total_fragments,
                        source: resolved.source,
                    },
                );
            }
        }
        table
    }

    pub fn insert(&mut self, query: &str, reference: &str, entry: AniEntry) {
        self.entries
            .entry(query.to_string())
            .or_default()
            .insert(reference.to_string(), entry);
    }

    pub fn get(&self, query: &str, reference: &str) -> Option<&AniEntry> {
        self.entries.get(query)?.get(reference)
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(|refs| refs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every label seen as a query or a reference, sorted.
    pub fn labels(&self) -> Vec<&str> {
        let mut labels: BTreeSet<&str> = BTreeSet::new();
        for (query, refs) in &self.entries {
            labels.insert(query);
            labels.extend(refs.keys().map(String::as_str));
        }
        labels.into_iter().collect()
    }

    fn both_directions(&self, g1: &str, g2: &str) -> Option<(&AniEntry, &AniEntry)> {
        Some((self.get(g1, g2)?, self.get(g2, g1)?))
    }

    ///
    /// ANI and AF between two genomes taken as the larger value of the two
    /// directions. `(0, 0)` unless both directions were computed.
    ///
    pub fn symmetric_ani(&self, g1: &str, g2: &str) -> (f64, f64) {
        self.both_directions(g1, g2)
            .map(|(fwd, rev)| (fwd.ani.max(rev.ani), fwd.af.max(rev.af)))
            .unwrap_or((0.0, 0.0))
    }

    /// Mean of both directions, `(0, 0)` unless both were computed.
    pub fn mean_ani(&self, g1: &str, g2: &str) -> (f64, f64) {
        self.both_directions(g1, g2)
            .map(|(fwd, rev)| ((fwd.ani + rev.ani) / 2.0, (fwd.af + rev.af) / 2.0))
            .unwrap_or((0.0, 0.0))
    }

    /// One row per computed pair, sorted by query then reference.
    pub fn write_ani_af<W: Write>(&self, writer: W) -> Result<()> {
        let mut wtr = tsv_writer(writer);
        wtr.write_record([
            "Query",
            "Reference",
            "ANI",
            "AF",
            "Fragments",
            "Total fragments",
            "Source",
        ])
        .map_err(csv_error)?;
        for (query, refs) in &self.entries {
            for (reference, entry) in refs {
                wtr.write_record(&[
                    query.clone(),
                    reference.clone(),
                    entry.ani.to_string(),
                    entry.af.to_string(),
                    entry.aligned_fragments.to_string(),
                    entry.total_fragments.to_string(),
                    entry.source.as_str().to_string(),
                ])
                .map_err(csv_error)?;
            }
        }
        wtr.flush()?;
        Ok(())
    }

    /// Full label x label matrix of one metric, `NA` where a pair is missing.
    pub fn write_matrix<W: Write>(&self, writer: W, metric: Metric) -> Result<()> {
        let labels = self.labels();
        let mut wtr = tsv_writer(writer);

        let mut header = vec![""];
        header.extend(labels.iter().copied());
        wtr.write_record(&header).map_err(csv_error)?;

        for query in &labels {
            let mut row = vec![query.to_string()];
            row.extend(labels.iter().map(|reference| {
                self.get(query, reference)
                    .map(|e| metric.of(e).to_string())
                    .unwrap_or_else(|| "NA".to_string())
            }));
            wtr.write_record(&row).map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }

    ///
    /// Write `ani_af.tsv` into `dir`, plus `ani_matrix.tsv` and
    /// `af_matrix.tsv` when `with_matrices` is set (all-vs-all runs).
    ///
    pub fn write_outputs<P: AsRef<Path>>(&self, dir: P, with_matrices: bool) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        create_dir_all(dir)?;

        let mut written = vec![dir.join(ANI_AF_FILE)];
        self.write_ani_af(File::create(&written[0])?)?;

        if with_matrices {
            for (name, metric) in [(ANI_MATRIX_FILE, Metric::Ani), (AF_MATRIX_FILE, Metric::Af)] {
                let path = dir.join(name);
                self.write_matrix(File::create(&path)?, metric)?;
                written.push(path);
            }
        }
        for path in &written {
            log::info!("Wrote {}", path.display());
        }
        Ok(written)
    }
}
