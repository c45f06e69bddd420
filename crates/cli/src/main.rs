use std::process::ExitCode;

fn main() -> ExitCode {
    fellah_cli::run()
}
