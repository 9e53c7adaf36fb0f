//! `gunzip` front end: decompress one gzip member into a file.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "gunzip")]
#[command(
    author,
    version,
    about = "Decompress a gzip file (Pure Rust)"
)]
struct Cli {
    /// Gzip file to decompress
    input: PathBuf,

    /// Output file
    output: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match oxiflate_cli::cmd_gunzip(&cli.input, &cli.output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("gunzip: {err}");
            ExitCode::FAILURE
        }
    }
}
