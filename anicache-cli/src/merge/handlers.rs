use std::path::Path;

use anyhow::Result;
use clap::ArgMatches;

use anicache_store::{CacheStore, MergeReport, merge_into_new, merge_stores};

fn print_report(report: &MergeReport) {
    println!(
        "from left: {}\tfrom right: {}\tidentical: {}\tconflicts: {}",
        report.from_left,
        report.from_right,
        report.identical,
        report.conflicts.len()
    );
    for conflict in &report.conflicts {
        println!("{}", conflict);
    }
}

pub fn run_merge(matches: &ArgMatches) -> Result<()> {
    let left = matches
        .get_one::<String>("left")
        .expect("A first input store is required");
    let right = matches
        .get_one::<String>("right")
        .expect("A second input store is required");
    let output = matches
        .get_one::<String>("output")
        .expect("A destination store is required");

    let (left, right, output) = (Path::new(left), Path::new(right), Path::new(output));

    let report = if matches.get_flag("into-existing") && output.exists() {
        let dest = CacheStore::open(output)?;
        merge_stores(
            &CacheStore::open_read_only(left)?,
            &CacheStore::open_read_only(right)?,
            &dest,
        )?
    } else {
        let (_, report) = merge_into_new(left, right, output)?;
        report
    };

    print_report(&report);
    log::info!("Merged store written to {}", output.display());
    Ok(())
}
