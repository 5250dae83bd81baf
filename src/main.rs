use clap::Parser;
use polydash::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
