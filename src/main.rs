use std::process::ExitCode;

fn main() -> ExitCode {
    match absorption_correction::app::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::from(err.exit_code())
        }
    }
}
