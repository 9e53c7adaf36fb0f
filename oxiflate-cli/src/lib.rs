//! Command implementations for the OxiFlate CLI front ends.
//!
//! Both binaries are thin wrappers: parse arguments, run the command, and
//! on failure print a one-line message to stderr and exit with status 1.
//! Decompression reports the member's metadata on stderr.

use filetime::FileTime;
use oxiflate_gzip::{GzipHeader, GzipReader, GzipWriter};
use std::error::Error;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;

/// Decompress `input` (a gzip file) into `output`.
///
/// Header metadata is reported on stderr, and the output file's
/// modification time is restored from the header when one is recorded.
pub fn cmd_gunzip(input: &Path, output: &Path) -> Result<(), Box<dyn Error>> {
    let file =
        File::open(input).map_err(|e| format!("cannot open {}: {e}", input.display()))?;
    let mut reader = GzipReader::new(BufReader::new(file))?;

    report_metadata(reader.header());
    let mtime = reader.header().mtime;

    let out = File::create(output)
        .map_err(|e| format!("cannot create {}: {e}", output.display()))?;
    let mut out = BufWriter::new(out);
    io::copy(&mut reader, &mut out)?;
    out.flush()?;
    drop(out);

    if mtime != 0 {
        filetime::set_file_mtime(output, FileTime::from_unix_time(mtime as i64, 0))
            .map_err(|e| format!("cannot set mtime on {}: {e}", output.display()))?;
    }
    Ok(())
}

/// Compress `input` into the gzip file `output` at `level`.
///
/// The input's file name and modification time are recorded in the header.
pub fn cmd_gzip(input: &Path, output: &Path, level: u8) -> Result<(), Box<dyn Error>> {
    let metadata =
        fs::metadata(input).map_err(|e| format!("cannot stat {}: {e}", input.display()))?;
    let mtime = FileTime::from_last_modification_time(&metadata);

    let mut header = GzipHeader::new().with_level(level);
    if let Some(name) = input.file_name().and_then(|n| n.to_str()) {
        header = header.with_filename(name);
    }
    if let Ok(seconds) = u32::try_from(mtime.unix_seconds()) {
        header = header.with_mtime(seconds);
    }

    let mut file =
        File::open(input).map_err(|e| format!("cannot open {}: {e}", input.display()))?;
    let out = File::create(output)
        .map_err(|e| format!("cannot create {}: {e}", output.display()))?;
    let mut writer = GzipWriter::with_header(BufWriter::new(out), header, level)?;
    io::copy(&mut file, &mut writer)?;
    writer.finish()?.flush()?;
    Ok(())
}

/// Print a gzip member's header metadata on stderr.
fn report_metadata(header: &GzipHeader) {
    if let Some(name) = &header.filename {
        eprintln!("original filename: {name}");
    }
    if let Some(comment) = &header.comment {
        eprintln!("comment: {comment}");
    }
    if header.mtime != 0 {
        eprintln!("modification time: {} (Unix time)", header.mtime);
    }
    eprintln!("operating system: {}", header.os_name());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_path(name: &str) -> std::path::PathBuf {
        env::temp_dir().join(format!("oxiflate-cli-test-{}-{name}", std::process::id()))
    }

    #[test]
    fn test_gzip_gunzip_roundtrip() {
        let plain = temp_path("plain.txt");
        let packed = temp_path("plain.txt.gz");
        let unpacked = temp_path("plain.out");

        fs::write(&plain, b"round and round the data goes").unwrap();
        cmd_gzip(&plain, &packed, 6).unwrap();
        cmd_gunzip(&packed, &unpacked).unwrap();
        assert_eq!(fs::read(&unpacked).unwrap(), b"round and round the data goes");

        for path in [&plain, &packed, &unpacked] {
            let _ = fs::remove_file(path);
        }
    }

    #[test]
    fn test_gunzip_missing_input() {
        let missing = temp_path("missing.gz");
        let out = temp_path("missing.out");
        let err = cmd_gunzip(&missing, &out).unwrap_err();
        assert!(err.to_string().contains("cannot open"));
    }
}
