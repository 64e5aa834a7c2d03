use clap::{Arg, ArgAction, Command};

pub const MERGE_CMD: &str = "merge";

pub fn create_merge_cli() -> Command {
    Command::new(MERGE_CMD)
        .author("Databio")
        .about("Merge two cache stores into a destination store, reporting conflicting records")
        .arg(Arg::new("left").required(true).help("First input store"))
        .arg(Arg::new("right").required(true).help("Second input store"))
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .required(true)
                .help("Destination store"),
        )
        .arg(
            Arg::new("into-existing")
                .long("into-existing")
                .action(ArgAction::SetTrue)
                .help("Allow the destination to be an existing store; its records take part in the merge"),
        )
}
