//! graft binary entry point.

use std::process::ExitCode;

fn main() -> ExitCode {
    match graftwork::cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            graftwork::ui::output::error(format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}
