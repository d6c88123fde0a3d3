use clap::Parser;
use squadtrader::cli::{run, Cli};

fn main() -> std::process::ExitCode {
    run(Cli::parse())
}
