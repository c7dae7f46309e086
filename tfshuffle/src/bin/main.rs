use clap::Parser;
use log::{error, info};

use tfshuffle::{run_with_args, Args};
use tfshuffle_core::error::exit_code_of;
use tfshuffle_core::tool::init_log;

fn main() {
    init_log();

    let args = Args::parse();

    match run_with_args(args) {
        Ok(report) => {
            info!(
                "Done. {} records written to {} shards, seed: {:?}",
                report.stats.total,
                report.shards.shards.len(),
                report.seed
            );
        }
        Err(e) => {
            error!("Shuffling failed, output files are not usable: {:#}", e);
            std::process::exit(exit_code_of(&e));
        }
    }
}
