use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::ArgMatches;

use anicache_core::consts::UNKNOWN_TOOL_VERSION;
use anicache_core::models::{ComparisonConfig, Genome};
use anicache_core::utils::{collect_genome_paths, get_default_store_path};
use anicache_engine::{AniTable, BatchScheduler, FastAniOracle, SchedulerOptions, plan_comparisons};
use anicache_store::CacheStore;

fn genomes_from(input: &str, file_ext: &str, validate: bool) -> Result<Vec<Genome>> {
    let paths = collect_genome_paths(Path::new(input), file_ext, validate)?;
    Ok(paths.into_iter().map(Genome::from_path).collect())
}

/// Start from the TOML file (if any), then apply command line overrides.
fn comparison_config(matches: &ArgMatches) -> Result<ComparisonConfig> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => ComparisonConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load comparison config: {}", path))?,
        None => ComparisonConfig::default(),
    };
    if let Some(k) = matches.get_one::<u32>("kmer-size") {
        config.kmer_size = *k;
    }
    if let Some(frag_len) = matches.get_one::<u32>("frag-len") {
        config.fragment_length = *frag_len;
    }
    if let Some(min_fraction) = matches.get_one::<f64>("min-fraction") {
        config.min_fraction = *min_fraction;
    }
    if let Some(version) = matches.get_one::<String>("tool-version") {
        config.tool_version = version.clone();
    }
    if matches.get_flag("symmetric") {
        config.symmetric = true;
    }
    config.validate()?;
    Ok(config)
}

pub fn run_resolve(matches: &ArgMatches) -> Result<()> {
    let query = matches
        .get_one::<String>("query")
        .expect("Query genomes are required");
    let reference = matches
        .get_one::<String>("reference")
        .expect("Reference genomes are required");
    let output_dir = matches
        .get_one::<String>("output-dir")
        .map(PathBuf::from)
        .expect("An output directory is required");
    let file_ext = matches
        .get_one::<String>("file-ext")
        .expect("A file extension is required");
    let validate = matches.get_flag("validate");
    let db = matches
        .get_one::<String>("db")
        .map(PathBuf::from)
        .unwrap_or_else(get_default_store_path);

    let queries = genomes_from(query, file_ext, validate)?;
    let references = genomes_from(reference, file_ext, validate)?;
    log::info!(
        "Identified {} query and {} reference genomes.",
        queries.len(),
        references.len()
    );

    let requests = plan_comparisons(&queries, &references, matches.get_flag("ref-to-query"));
    log::info!("Calculating ANI between {} genome pairs.", requests.len());

    let start = Instant::now();
    let oracle = FastAniOracle::locate()?;
    let mut config = comparison_config(matches)?;
    if config.tool_version == UNKNOWN_TOOL_VERSION {
        config.tool_version = oracle.version().to_string();
    }

    let store = CacheStore::open(&db)?;
    let options = SchedulerOptions::default()
        .with_threads(*matches.get_one::<usize>("threads").unwrap_or(&0))
        .with_batch_size(*matches.get_one::<usize>("batch-size").unwrap_or(&100))
        .with_progress(!matches.get_flag("quiet"));
    let scheduler = BatchScheduler::new(&store, &oracle).with_options(options);
    let report = scheduler.resolve(&requests, &config)?;

    let table = AniTable::from_report(&report);
    table.write_outputs(&output_dir, query == reference)?;

    log::info!(
        "Time to calculate ANI values (h:mm:ss): {}",
        format_elapsed(start.elapsed().as_secs())
    );
    println!(
        "hits: {}\tcomputed: {}\tfailed: {}",
        report.hits, report.computed, report.failed
    );

    if !report.is_success() {
        for (request, err) in report.failures() {
            eprintln!("{}\t{}\t{}", request.query, request.reference, err);
        }
        anyhow::bail!(
            "{} of {} comparisons failed",
            report.failed,
            report.outcomes.len()
        );
    }

    log::info!("Done.");
    Ok(())
}

fn format_elapsed(secs: u64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}
