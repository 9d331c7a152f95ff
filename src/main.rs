use std::process::ExitCode;

fn main() -> ExitCode {
    reposync::cli::run()
}
