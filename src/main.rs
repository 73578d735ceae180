#![forbid(unsafe_code)]

//! adsel: audio device-selection simulator CLI entry point.

use clap::Parser;

mod cli_app;

fn main() {
    let args = match cli_app::Cli::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let code = if e.use_stderr() {
                cli_app::USAGE_EXIT_CODE
            } else {
                0
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    match cli_app::run(&args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("adsel: {e}");
            std::process::exit(e.exit_code());
        }
    }
}
