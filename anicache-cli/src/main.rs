mod dump;
mod merge;
mod resolve;

use anyhow::Result;
use clap::Command;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const BIN_NAME: &str = "anicache";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .author("Databio")
        .about("Calculate ANI between genomes, reusing every result already in a shared cache.")
        .subcommand_required(true)
        .subcommand(resolve::cli::create_resolve_cli())
        .subcommand(merge::cli::create_merge_cli())
        .subcommand(dump::cli::create_dump_cli())
        .subcommand(dump::cli::create_stats_cli())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = build_parser();
    let matches = app.get_matches();

    match matches.subcommand() {
        //
        // RESOLVE
        //
        Some((resolve::cli::RESOLVE_CMD, matches)) => {
            resolve::handlers::run_resolve(matches)?;
        }

        //
        // MERGE
        //
        Some((merge::cli::MERGE_CMD, matches)) => {
            merge::handlers::run_merge(matches)?;
        }

        //
        // STORE INSPECTION
        //
        Some((dump::cli::DUMP_CMD, matches)) => {
            dump::handlers::run_dump(matches)?;
        }
        Some((dump::cli::STATS_CMD, matches)) => {
            dump::handlers::run_stats(matches)?;
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}
