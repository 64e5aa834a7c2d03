use clap::{Arg, ArgAction, Command};

pub const RESOLVE_CMD: &str = "resolve";
pub const DEFAULT_FILE_EXT: &str = ".fna";

pub fn create_resolve_cli() -> Command {
    Command::new(RESOLVE_CMD)
        .author("Databio")
        .about("Calculate ANI between query and reference genomes, computing only pairs missing from the cache")
        .arg(
            Arg::new("query")
                .long("query")
                .short('q')
                .required(true)
                .help("Directory of query genomes, or a file listing one genome path per line"),
        )
        .arg(
            Arg::new("reference")
                .long("reference")
                .short('r')
                .required(true)
                .help("Directory of reference genomes, or a file listing one genome path per line"),
        )
        .arg(
            Arg::new("output-dir")
                .long("output-dir")
                .short('o')
                .required(true)
                .help("Directory for ani_af.tsv (and the matrices for all-vs-all runs)"),
        )
        .arg(
            Arg::new("file-ext")
                .long("file-ext")
                .short('x')
                .default_value(DEFAULT_FILE_EXT)
                .help("Extension of genome files when an input is a directory"),
        )
        .arg(
            Arg::new("validate")
                .long("validate")
                .action(ArgAction::SetTrue)
                .help("Check that every listed genome file exists before starting"),
        )
        .arg(
            Arg::new("ref-to-query")
                .long("ref-to-query")
                .action(ArgAction::SetTrue)
                .help("Also compare every reference against every query"),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .short('d')
                .help("Cache store path [default: $ANICACHE_DB or ~/.anicache/ani_cache.db]"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("TOML file with comparison settings"),
        )
        .arg(
            Arg::new("kmer-size")
                .long("kmer-size")
                .short('k')
                .value_parser(clap::value_parser!(u32))
                .help("k-mer size passed to fastANI"),
        )
        .arg(
            Arg::new("frag-len")
                .long("frag-len")
                .value_parser(clap::value_parser!(u32))
                .help("Fragment length passed to fastANI"),
        )
        .arg(
            Arg::new("min-fraction")
                .long("min-fraction")
                .value_parser(clap::value_parser!(f64))
                .help("Minimum shared genome fraction passed to fastANI"),
        )
        .arg(
            Arg::new("tool-version")
                .long("tool-version")
                .help("Record results under this tool version instead of the detected one"),
        )
        .arg(
            Arg::new("symmetric")
                .long("symmetric")
                .action(ArgAction::SetTrue)
                .help("Treat A vs B and B vs A as the same comparison"),
        )
        .arg(
            Arg::new("threads")
                .long("threads")
                .short('t')
                .value_parser(clap::value_parser!(usize))
                .default_value("0")
                .help("Number of worker threads (0 = all cores)"),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .value_parser(clap::value_parser!(usize))
                .default_value("100")
                .help("Commit newly computed results every this many pairs"),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Don't show a progress bar"),
        )
}
