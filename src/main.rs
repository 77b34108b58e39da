use std::process::ExitCode;

use sird_grid::runner::run_with_args;

fn main() -> ExitCode {
    match run_with_args(|_, _| Ok(())) {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("sird-grid: {error}");
            ExitCode::FAILURE
        }
    }
}
