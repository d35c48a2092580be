use std::process::ExitCode;

fn main() -> ExitCode {
    hourbot_cli::run()
}
