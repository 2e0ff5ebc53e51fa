use clap::Parser;
use lineflow::cli::{Cli, run};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
