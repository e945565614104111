//! Ion script compiler binary

use ionc::cli::Cli;
use std::process;

fn main() {
    env_logger::init();
    process::exit(Cli::run());
}
