//! `gzip` front end: compress one file into a gzip member.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "gzip")]
#[command(
    author,
    version,
    about = "Compress a file into gzip format (Pure Rust)"
)]
struct Cli {
    /// File to compress
    input: PathBuf,

    /// Output gzip file
    output: PathBuf,

    /// Compression level (0 = store, 9 = best)
    #[arg(short, long, default_value_t = 6, value_parser = clap::value_parser!(u8).range(0..=9))]
    level: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match oxiflate_cli::cmd_gzip(&cli.input, &cli.output, cli.level) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("gzip: {err}");
            ExitCode::FAILURE
        }
    }
}
