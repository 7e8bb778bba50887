use std::process::ExitCode;

fn main() -> ExitCode {
    merchhours_cli::run()
}
