use clap::Parser;
use log::debug;

use strata::cli::{self, Args};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Console logging (respects RUST_LOG if set)
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let default_level = match args.verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();

    debug!("Command-line args: {:?}", args);
    cli::run(&args)
}
