use std::collections::{BTreeMap, BTreeSet};

use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};

use anicache_core::errors::{AniCacheError, Result};
use anicache_core::models::{CacheRecord, ComparisonConfig, Genome, GenomeDigest, PairKey};
use anicache_digest::{GenomeResolver, PairKeyBuilder};
use anicache_store::{CacheStore, WriteMode};

use crate::consts::DEFAULT_BATCH_SIZE;
use crate::oracle::Oracle;

const PROGRESS_TEMPLATE: &str = "[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} pairs ({eta} left) {msg}";

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Worker threads for fingerprinting and oracle calls; 0 uses every core.
    pub threads: usize,
    /// Computed records are committed in groups of this many.
    pub batch_size: usize,
    pub report_progress: bool,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        SchedulerOptions {
            threads: 0,
            batch_size: DEFAULT_BATCH_SIZE,
            report_progress: false,
        }
    }
}

impl SchedulerOptions {
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_progress(mut self, report_progress: bool) -> Self {
        self.report_progress = report_progress;
        self
    }
}

/// One requested comparison, `query` against `reference`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PairRequest {
    pub query: Genome,
    pub reference: Genome,
}

impl PairRequest {
    pub fn new(query: Genome, reference: Genome) -> Self {
        PairRequest { query, reference }
    }
}

///
/// Every query against every reference, and optionally every reference
/// against every query as well.
///
pub fn plan_comparisons(
    queries: &[Genome],
    references: &[Genome],
    ref_to_query: bool,
) -> Vec<PairRequest> {
    let mut requests = Vec::with_capacity(queries.len() * references.len() * (1 + ref_to_query as usize));
    for query in queries {
        for reference in references {
            requests.push(PairRequest::new(query.clone(), reference.clone()));
            if ref_to_query {
                requests.push(PairRequest::new(reference.clone(), query.clone()));
            }
        }
    }
    requests
}

/// Where a returned record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Already in the store before this run wrote anything.
    Cache,
    /// Computed by this run and written to the store.
    Computed,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Cache => "cache",
            Source::Computed => "computed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub record: CacheRecord,
    pub source: Source,
}

/// The answer for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct PairOutcome {
    pub request: PairRequest,
    /// `None` when a genome couldn't be fingerprinted.
    pub key: Option<PairKey>,
    pub result: Result<Resolved>,
}

/// Partial-success result of a batch: one outcome per request, in order.
#[derive(Debug, Default)]
pub struct ResolveReport {
    pub outcomes: Vec<PairOutcome>,
    /// Requests served from the store.
    pub hits: usize,
    /// Requests answered by a computation of this run.
    pub computed: usize,
    /// Requests that ended in an error.
    pub failed: usize,
    /// Number of times the oracle was invoked.
    pub oracle_calls: usize,
}

impl ResolveReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = (&PairRequest, &AniCacheError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (&o.request, e)))
    }
}

///
/// Serves comparison requests from a [CacheStore], computing only what is
/// missing.
///
/// For a batch of requests the scheduler
///
/// 1. fingerprints every distinct genome once, in parallel
/// 2. builds the pair keys and collapses duplicates (including both
///    orders of a pair when the config is symmetric)
/// 3. looks every key up in one store transaction
/// 4. runs the oracle for the misses on a bounded worker pool
/// 5. commits the new records batch by batch, insert-only-if-absent
///
/// Per-genome and per-pair failures are returned in the report; only
/// store failures abort the call. Batches committed before such an abort
/// stay in the store.
///
/// The fingerprint memo lives as long as the scheduler, so genome files
/// should not be rewritten in place while it is in use.
///
pub struct BatchScheduler<'a, O: Oracle> {
    store: &'a CacheStore,
    oracle: &'a O,
    resolver: GenomeResolver,
    options: SchedulerOptions,
}

impl<'a, O: Oracle> BatchScheduler<'a, O> {
    pub fn new(store: &'a CacheStore, oracle: &'a O) -> Self {
        BatchScheduler {
            store,
            oracle,
            resolver: GenomeResolver::new(),
            options: SchedulerOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SchedulerOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    pub fn resolver(&self) -> &GenomeResolver {
        &self.resolver
    }

    fn pool(&self) -> Result<ThreadPool> {
        ThreadPoolBuilder::new()
            .num_threads(self.options.threads)
            .build()
            .map_err(|e| AniCacheError::InvalidConfig(format!("can't start worker pool: {}", e)))
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.options.report_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::default_bar().template(PROGRESS_TEMPLATE) {
            pb.set_style(style);
        }
        pb
    }

    ///
    /// Resolve every request under `config`.
    ///
    /// # Errors
    ///
    /// Only fatal errors: an invalid config, or `StoreUnavailable` /
    /// `SchemaVersionMismatch` from the store.
    ///
    pub fn resolve(&self, requests: &[PairRequest], config: &ComparisonConfig) -> Result<ResolveReport> {
        let builder = PairKeyBuilder::new(config)?;
        let pool = self.pool()?;

        // fingerprint each distinct genome once
        let genomes: Vec<Genome> = requests
            .iter()
            .flat_map(|r| [&r.query, &r.reference])
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        log::info!("Fingerprinting {} genomes.", genomes.len());
        let fingerprints = pool.install(|| self.resolver.fingerprint_all(&genomes));
        let digests: BTreeMap<Genome, Result<GenomeDigest>> =
            genomes.into_iter().zip(fingerprints).collect();
        for err in digests.values().filter_map(|d| d.as_ref().err()) {
            log::warn!("{}", err);
        }

        let digest_of = |genome: &Genome| -> Result<GenomeDigest> {
            digests.get(genome).cloned().unwrap_or_else(|| {
                Err(AniCacheError::UnreadableGenome {
                    label: genome.label.clone(),
                    reason: "not fingerprinted".to_string(),
                })
            })
        };
        let keys: Vec<Result<PairKey>> = requests
            .iter()
            .map(|r| {
                let query = digest_of(&r.query)?;
                let reference = digest_of(&r.reference)?;
                Ok(builder.build(&query, &reference))
            })
            .collect();

        // one consistent lookup for every distinct key
        let distinct: Vec<PairKey> = keys
            .iter()
            .filter_map(|k| k.as_ref().ok().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let mut resolved: BTreeMap<PairKey, Result<Resolved>> = self
            .store
            .get_many(&distinct)?
            .into_iter()
            .filter_map(|(key, record)| {
                record.map(|record| {
                    (
                        key,
                        Ok(Resolved {
                            record,
                            source: Source::Cache,
                        }),
                    )
                })
            })
            .collect();

        // the first request for each missing key is the one computed
        let mut missing: Vec<(PairKey, &PairRequest)> = Vec::new();
        let mut queued = BTreeSet::new();
        for (request, key) in requests.iter().zip(&keys) {
            if let Ok(key) = key {
                if !resolved.contains_key(key) && queued.insert(key.clone()) {
                    missing.push((key.clone(), request));
                }
            }
        }
        log::info!(
            "{} pairs requested: {} distinct keys, {} cached, {} to compute.",
            requests.len(),
            distinct.len(),
            resolved.len(),
            missing.len()
        );

        let progress = self.progress_bar(missing.len());
        let mut oracle_calls = 0;
        for batch in missing.chunks(self.options.batch_size.max(1)) {
            let computed: Vec<(PairKey, Result<CacheRecord>)> = pool.install(|| {
                batch
                    .par_iter()
                    .map(|(key, request)| {
                        let result = self.compute(request, config);
                        progress.inc(1);
                        (key.clone(), result)
                    })
                    .collect()
            });
            oracle_calls += batch.len();
            self.commit_batch(computed, &mut resolved)?;
        }
        progress.finish_and_clear();

        let mut report = ResolveReport {
            oracle_calls,
            ..Default::default()
        };
        for (request, key) in requests.iter().zip(keys) {
            let result = match &key {
                Ok(key) => resolved.get(key).cloned().unwrap_or_else(|| {
                    Err(AniCacheError::ComputationFailed {
                        query: request.query.label.clone(),
                        reference: request.reference.label.clone(),
                        reason: "no result was produced".to_string(),
                    })
                }),
                Err(e) => Err(e.clone()),
            };
            match &result {
                Ok(Resolved {
                    source: Source::Cache,
                    ..
                }) => report.hits += 1,
                Ok(Resolved {
                    source: Source::Computed,
                    ..
                }) => report.computed += 1,
                Err(_) => report.failed += 1,
            }
            report.outcomes.push(PairOutcome {
                request: request.clone(),
                key: key.ok(),
                result,
            });
        }

        log::info!(
            "{} served from cache, {} newly computed, {} failed.",
            report.hits,
            report.computed,
            report.failed
        );
        Ok(report)
    }

    fn compute(&self, request: &PairRequest, config: &ComparisonConfig) -> Result<CacheRecord> {
        let output = self
            .oracle
            .compare(&request.query, &request.reference, config)?;
        let record = output.into_record(config);
        record
            .validate()
            .map_err(|e| AniCacheError::ComputationFailed {
                query: request.query.label.clone(),
                reference: request.reference.label.clone(),
                reason: e.to_string(),
            })?;
        Ok(record)
    }

    ///
    /// Persist one batch of computations and fold the results into
    /// `resolved`.
    ///
    /// Keys another writer stored first are re-read, and that stored
    /// record is what the caller gets.
    ///
    fn commit_batch(
        &self,
        computed: Vec<(PairKey, Result<CacheRecord>)>,
        resolved: &mut BTreeMap<PairKey, Result<Resolved>>,
    ) -> Result<()> {
        let mut records = Vec::with_capacity(computed.len());
        for (key, result) in computed {
            match result {
                Ok(record) => records.push((key, record)),
                Err(e) => {
                    log::warn!("{}", e);
                    resolved.insert(key, Err(e));
                }
            }
        }
        if records.is_empty() {
            return Ok(());
        }

        let outcome = self.store.put_many(&records, WriteMode::InsertIfAbsent)?;
        let mut fresh: BTreeMap<PairKey, CacheRecord> = records.into_iter().collect();

        for key in outcome.written {
            if let Some(record) = fresh.remove(&key) {
                resolved.insert(
                    key,
                    Ok(Resolved {
                        record,
                        source: Source::Computed,
                    }),
                );
            }
        }
        for (key, err) in outcome.rejected {
            fresh.remove(&key);
            resolved.insert(key, Err(err));
        }
        if !outcome.skipped.is_empty() {
            log::debug!(
                "{} keys were stored by another writer first",
                outcome.skipped.len()
            );
            for (key, stored) in self.store.get_many(&outcome.skipped)? {
                let result = match (stored, fresh.remove(&key)) {
                    (Some(record), _) => Ok(Resolved {
                        record,
                        source: Source::Cache,
                    }),
                    (None, Some(record)) => Ok(Resolved {
                        record,
                        source: Source::Computed,
                    }),
                    (None, None) => continue,
                };
                resolved.insert(key, result);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn genome(name: &str) -> Genome {
        Genome::from_path(format!("/data/{}.fna", name))
    }

    #[test]
    fn test_plan_cross_product() {
        let queries = [genome("q1"), genome("q2")];
        let references = [genome("r1")];
        let plan = plan_comparisons(&queries, &references, false);
        assert_eq!(
            plan,
            vec![
                PairRequest::new(genome("q1"), genome("r1")),
                PairRequest::new(genome("q2"), genome("r1")),
            ]
        );
    }

    #[test]
    fn test_plan_with_reverse_direction() {
        let plan = plan_comparisons(&[genome("q")], &[genome("r")], true);
        assert_eq!(
            plan,
            vec![
                PairRequest::new(genome("q"), genome("r")),
                PairRequest::new(genome("r"), genome("q")),
            ]
        );
    }

    #[test]
    fn test_default_options() {
        let options = SchedulerOptions::default();
        assert_eq!(options.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(options.threads, 0);
        assert!(!options.report_progress);
    }
}
