use clap::Parser;
use danton_cli::{execute, Opts};
use std::process::{ExitCode, Termination};

fn main() -> ExitCode {
    let opts = Opts::parse();

    match execute(&opts) {
        Ok(code) => code,
        result @ Err(_) => result.report(),
    }
}
