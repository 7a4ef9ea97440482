use std::process::ExitCode;

fn main() -> ExitCode {
    propconf_cli::run()
}
