use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use pretty_assertions::assert_eq;
use rstest::*;
use tempfile::{TempDir, tempdir};

use anicache_core::errors::{AniCacheError, Result};
use anicache_core::models::{CacheRecord, ComparisonConfig, Genome};
use anicache_digest::{GenomeResolver, build_pair_key};
use anicache_engine::{
    AniTable, BatchScheduler, OracleOutput, PairRequest, SchedulerOptions, Source, plan_comparisons,
};
use anicache_store::{CacheStore, WriteMode};

fn write_genome(dir: &Path, name: &str, body: &str) -> Genome {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    Genome::from_path(path)
}

struct Genomes {
    _dir: TempDir,
    x: Genome,
    y: Genome,
    z: Genome,
    y_copy: Genome,
    broken: Genome,
}

#[fixture]
fn genomes() -> Genomes {
    let dir = tempdir().unwrap();
    let x = write_genome(dir.path(), "x.fna", ">x1\nACGTACGTAA\n>x2\nGGGCCC\n");
    let y = write_genome(dir.path(), "y.fna", ">y\nTTTTACGAAC\nGATC\n");
    let z = write_genome(dir.path(), "z.fna", ">z\nCCCCAAAAGGGG\n");
    let y_copy = write_genome(dir.path(), "y_copy.fna", ">other name\nttttacgaacgatc\n");
    let broken = write_genome(dir.path(), "broken.fna", "this is not fasta\n");
    Genomes {
        _dir: dir,
        x,
        y,
        z,
        y_copy,
        broken,
    }
}

/// Deterministic fake comparison: ANI depends on the labels only.
fn fake_output(query: &Genome, reference: &Genome) -> OracleOutput {
    let ani = 90.0 + (query.label.len() + 2 * reference.label.len()) as f64 / 10.0;
    OracleOutput {
        ani,
        aligned_fraction: 0.75,
        aligned_fragments: 30,
        total_fragments: 40,
    }
}

fn ok(report_result: &Result<anicache_engine::Resolved>) -> &anicache_engine::Resolved {
    report_result.as_ref().unwrap()
}

#[rstest]
fn test_second_run_is_served_entirely_from_cache(genomes: Genomes) {
    let store = CacheStore::in_memory().unwrap();
    let calls = AtomicUsize::new(0);
    let oracle = |q: &Genome, r: &Genome, _: &ComparisonConfig| -> Result<OracleOutput> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(fake_output(q, r))
    };
    let config = ComparisonConfig::default();
    let all = [genomes.x.clone(), genomes.y.clone(), genomes.z.clone()];
    let requests = plan_comparisons(&all, &all, false);

    let scheduler = BatchScheduler::new(&store, &oracle);
    let first = scheduler.resolve(&requests, &config).unwrap();
    assert_eq!(first.computed, 9);
    assert_eq!(first.oracle_calls, 9);
    assert_eq!(calls.load(Ordering::SeqCst), 9);

    // a fresh scheduler, as in a new process
    let scheduler = BatchScheduler::new(&store, &oracle);
    let second = scheduler.resolve(&requests, &config).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 9);
    assert_eq!(second.hits, 9);
    assert_eq!(second.oracle_calls, 0);

    for (a, b) in first.outcomes.iter().zip(&second.outcomes) {
        assert_eq!(ok(&a.result).record, ok(&b.result).record);
        assert_eq!(ok(&b.result).source, Source::Cache);
    }
}

#[rstest]
fn test_cached_pair_is_not_recomputed(genomes: Genomes) {
    let store = CacheStore::in_memory().unwrap();
    let config = ComparisonConfig::default();
    let resolver = GenomeResolver::new();
    let x = resolver.fingerprint(&genomes.x).unwrap();
    let y = resolver.fingerprint(&genomes.y).unwrap();
    let z = resolver.fingerprint(&genomes.z).unwrap();

    let k1 = build_pair_key(&x, &y, &config).unwrap();
    let k1_record = CacheRecord::new(98.5, 0.92, 37, 40, config.clone());
    store.put(&k1, &k1_record, WriteMode::InsertIfAbsent).unwrap();

    let computed_pairs = std::sync::Mutex::new(Vec::new());
    let oracle = |q: &Genome, r: &Genome, _: &ComparisonConfig| -> Result<OracleOutput> {
        computed_pairs
            .lock()
            .unwrap()
            .push((q.label.clone(), r.label.clone()));
        Ok(fake_output(q, r))
    };
    let requests = vec![
        PairRequest::new(genomes.x.clone(), genomes.y.clone()),
        PairRequest::new(genomes.x.clone(), genomes.z.clone()),
    ];
    let report = BatchScheduler::new(&store, &oracle)
        .resolve(&requests, &config)
        .unwrap();

    assert_eq!(
        computed_pairs.into_inner().unwrap(),
        vec![("x.fna".to_string(), "z.fna".to_string())]
    );
    assert_eq!((report.hits, report.computed, report.failed), (1, 1, 0));
    assert_eq!(ok(&report.outcomes[0].result).record, k1_record);

    let k2 = build_pair_key(&x, &z, &config).unwrap();
    assert_eq!(report.outcomes[1].key, Some(k2.clone()));
    let stored = store.get(&k2).unwrap().unwrap();
    assert_eq!(stored, ok(&report.outcomes[1].result).record);
    assert_eq!(stored.ani, fake_output(&genomes.x, &genomes.z).ani);
}

#[rstest]
fn test_failed_pair_is_reported_and_retried(genomes: Genomes) {
    let store = CacheStore::in_memory().unwrap();
    let config = ComparisonConfig::default();
    let broken_tool = AtomicBool::new(true);
    let oracle = |q: &Genome, r: &Genome, _: &ComparisonConfig| -> Result<OracleOutput> {
        if broken_tool.load(Ordering::SeqCst) && q.label == "x.fna" && r.label == "y.fna" {
            return Err(AniCacheError::ComputationFailed {
                query: q.label.clone(),
                reference: r.label.clone(),
                reason: "FastANI exited with code 1".to_string(),
            });
        }
        Ok(fake_output(q, r))
    };
    let requests = vec![
        PairRequest::new(genomes.x.clone(), genomes.y.clone()),
        PairRequest::new(genomes.x.clone(), genomes.z.clone()),
    ];
    let scheduler = BatchScheduler::new(&store, &oracle);

    let report = scheduler.resolve(&requests, &config).unwrap();
    assert!(!report.is_success());
    assert_eq!((report.computed, report.failed), (1, 1));
    assert!(matches!(
        report.outcomes[0].result,
        Err(AniCacheError::ComputationFailed { .. })
    ));
    let failed_key = report.outcomes[0].key.clone().unwrap();
    assert_eq!(store.get(&failed_key).unwrap(), None);
    assert_eq!(store.len().unwrap(), 1);

    broken_tool.store(false, Ordering::SeqCst);
    let retry = scheduler.resolve(&requests, &config).unwrap();
    assert!(retry.is_success());
    assert_eq!((retry.hits, retry.computed, retry.oracle_calls), (1, 1, 1));
    assert!(store.contains(&failed_key).unwrap());
}

#[rstest]
#[case(true, 1)]
#[case(false, 2)]
fn test_both_orders_share_a_symmetric_key(
    genomes: Genomes,
    #[case] symmetric: bool,
    #[case] expected_calls: usize,
) {
    let store = CacheStore::in_memory().unwrap();
    let calls = AtomicUsize::new(0);
    let oracle = |q: &Genome, r: &Genome, _: &ComparisonConfig| -> Result<OracleOutput> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(fake_output(q, r))
    };
    let config = ComparisonConfig::default().with_symmetric(symmetric);
    let requests = plan_comparisons(&[genomes.x.clone()], &[genomes.y.clone()], true);

    let report = BatchScheduler::new(&store, &oracle)
        .resolve(&requests, &config)
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), expected_calls);
    assert_eq!(report.computed, 2);
    assert_eq!(store.len().unwrap(), expected_calls);
    assert_eq!(
        report.outcomes[0].key == report.outcomes[1].key,
        symmetric
    );
}

#[rstest]
fn test_same_content_is_computed_once(genomes: Genomes) {
    let store = CacheStore::in_memory().unwrap();
    let calls = AtomicUsize::new(0);
    let oracle = |q: &Genome, r: &Genome, _: &ComparisonConfig| -> Result<OracleOutput> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(fake_output(q, r))
    };
    let requests = vec![
        PairRequest::new(genomes.x.clone(), genomes.y.clone()),
        PairRequest::new(genomes.x.clone(), genomes.y_copy.clone()),
    ];
    let report = BatchScheduler::new(&store, &oracle)
        .resolve(&requests, &ComparisonConfig::default())
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.outcomes[0].key, report.outcomes[1].key);
    assert_eq!(
        ok(&report.outcomes[0].result).record,
        ok(&report.outcomes[1].result).record
    );
}

#[rstest]
fn test_unreadable_genome_fails_only_its_pairs(genomes: Genomes) {
    let store = CacheStore::in_memory().unwrap();
    let calls = AtomicUsize::new(0);
    let oracle = |q: &Genome, r: &Genome, _: &ComparisonConfig| -> Result<OracleOutput> {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(fake_output(q, r))
    };
    let requests = plan_comparisons(
        &[genomes.x.clone(), genomes.broken.clone()],
        &[genomes.y.clone()],
        true,
    );
    let report = BatchScheduler::new(&store, &oracle)
        .resolve(&requests, &ComparisonConfig::default())
        .unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!((report.computed, report.failed), (2, 2));
    let failed: Vec<_> = report.failures().collect();
    assert!(failed.iter().all(|(request, err)| {
        (request.query == genomes.broken || request.reference == genomes.broken)
            && matches!(err, AniCacheError::UnreadableGenome { label, .. } if label == "broken.fna")
    }));
    assert!(report.outcomes[2].key.is_none());
}

#[rstest]
fn test_out_of_range_result_is_not_cached(genomes: Genomes) {
    let store = CacheStore::in_memory().unwrap();
    let oracle = |_: &Genome, _: &Genome, _: &ComparisonConfig| -> Result<OracleOutput> {
        Ok(OracleOutput {
            ani: 140.0,
            aligned_fraction: 0.5,
            aligned_fragments: 1,
            total_fragments: 2,
        })
    };
    let requests = vec![PairRequest::new(genomes.x.clone(), genomes.y.clone())];
    let report = BatchScheduler::new(&store, &oracle)
        .resolve(&requests, &ComparisonConfig::default())
        .unwrap();
    assert_eq!(report.failed, 1);
    assert!(store.is_empty().unwrap());
}

#[rstest]
fn test_every_batch_is_committed(genomes: Genomes) {
    let store = CacheStore::in_memory().unwrap();
    let oracle = |q: &Genome, r: &Genome, _: &ComparisonConfig| -> Result<OracleOutput> {
        Ok(fake_output(q, r))
    };
    let all = [genomes.x.clone(), genomes.y.clone(), genomes.z.clone()];
    let requests = plan_comparisons(&all, &all, false);
    let options = SchedulerOptions::default()
        .with_batch_size(2)
        .with_threads(2);
    let report = BatchScheduler::new(&store, &oracle)
        .with_options(options)
        .resolve(&requests, &ComparisonConfig::default())
        .unwrap();
    assert_eq!(report.computed, 9);
    assert_eq!(store.len().unwrap(), 9);
}

#[rstest]
fn test_concurrent_writer_wins_the_race(genomes: Genomes) {
    let store = CacheStore::in_memory().unwrap();
    let config = ComparisonConfig::default();
    let resolver = GenomeResolver::new();
    let key = build_pair_key(
        &resolver.fingerprint(&genomes.x).unwrap(),
        &resolver.fingerprint(&genomes.y).unwrap(),
        &config,
    )
    .unwrap();
    let theirs = CacheRecord::new(91.0, 0.5, 20, 40, config.clone());

    // another writer stores the same key while our computation runs
    let oracle = |q: &Genome, r: &Genome, _: &ComparisonConfig| -> Result<OracleOutput> {
        store.put(&key, &theirs, WriteMode::InsertIfAbsent).unwrap();
        Ok(fake_output(q, r))
    };
    let requests = vec![PairRequest::new(genomes.x.clone(), genomes.y.clone())];
    let report = BatchScheduler::new(&store, &oracle)
        .resolve(&requests, &config)
        .unwrap();

    let resolved = ok(&report.outcomes[0].result);
    assert_eq!(resolved.record, theirs);
    assert_eq!(resolved.source, Source::Cache);
    assert_eq!(store.get(&key).unwrap(), Some(theirs));
}

#[rstest]
fn test_report_feeds_result_table(genomes: Genomes) {
    let store = CacheStore::in_memory().unwrap();
    let oracle = |q: &Genome, r: &Genome, _: &ComparisonConfig| -> Result<OracleOutput> {
        Ok(fake_output(q, r))
    };
    let all = [genomes.x.clone(), genomes.z.clone()];
    let report = BatchScheduler::new(&store, &oracle)
        .resolve(&plan_comparisons(&all, &all, false), &ComparisonConfig::default())
        .unwrap();

    let table = AniTable::from_report(&report);
    assert_eq!(table.len(), 4);
    assert_eq!(table.labels(), vec!["x.fna", "z.fna"]);
    let entry = table.get("x.fna", "z.fna").unwrap();
    assert_eq!(entry.ani, fake_output(&genomes.x, &genomes.z).ani);
    assert_eq!(entry.source, Source::Computed);
}

#[rstest]
fn test_store_failure_aborts_resolve(genomes: Genomes) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("ani_cache.db");
    drop(CacheStore::open(&path).unwrap());
    let store = CacheStore::open_read_only(&path).unwrap();
    let oracle = |q: &Genome, r: &Genome, _: &ComparisonConfig| -> Result<OracleOutput> {
        Ok(fake_output(q, r))
    };
    let requests = [PairRequest::new(genomes.x.clone(), genomes.y.clone())];

    let scheduler = BatchScheduler::new(&store, &oracle);
    let err = scheduler.resolve(&requests, &ComparisonConfig::default()).err().unwrap();
    assert!(matches!(err, AniCacheError::StoreUnavailable(_)));
    assert!(store.is_empty().unwrap());
}
