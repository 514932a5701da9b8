use clap::Parser;
use dcagrid::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
