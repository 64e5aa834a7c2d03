use clap::{Arg, Command};

pub const DUMP_CMD: &str = "dump";
pub const STATS_CMD: &str = "stats";

fn db_arg() -> Arg {
    Arg::new("db")
        .long("db")
        .short('d')
        .help("Cache store path [default: $ANICACHE_DB or ~/.anicache/ani_cache.db]")
}

pub fn create_dump_cli() -> Command {
    Command::new(DUMP_CMD)
        .author("Databio")
        .about("Write every cached record to a human-readable CSV/TSV file")
        .arg(db_arg())
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .help("Output file [default: stdout]"),
        )
        .arg(
            Arg::new("format")
                .long("format")
                .short('f')
                .value_parser(["CSV", "TSV"])
                .help("Output format [default: from the output extension, CSV on stdout]"),
        )
}

pub fn create_stats_cli() -> Command {
    Command::new(STATS_CMD)
        .author("Databio")
        .about("Show the number of records and the schema of a cache store")
        .arg(db_arg())
}
