// Shared helpers for the command line tests
#![allow(dead_code)]

use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

/// Runs the barycenter binary with `args`, returning stdout, stderr and the exit code.
pub fn run_barycenter(args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_barycenter"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to start barycenter");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.code().unwrap_or(-1),
    )
}

/// Writes `file_content` to a temporary file and runs the binary on it, the
/// path going last.
pub fn run_barycenter_with_file(args: &[&str], file_content: &str) -> (String, String, i32) {
    let mut temp_file = NamedTempFile::new().expect("Failed to create temp file");
    temp_file
        .write_all(file_content.as_bytes())
        .expect("Failed to write to temp file");

    let path = temp_file.path().to_str().expect("temp path is not UTF-8");
    let mut full_args = args.to_vec();
    full_args.push(path);

    run_barycenter(&full_args)
}

/// Pulls the three numbers out of "System barycenter is at (x, y, z) and the system's mass is m."
pub fn parse_barycenter_line(stdout: &str) -> Option<([f64; 3], f64)> {
    let line = stdout
        .lines()
        .find(|line| line.starts_with("System barycenter is at"))?;
    let open = line.find('(')?;
    let close = line.find(')')?;
    let coords: Vec<f64> = line[open + 1..close]
        .split(", ")
        .map(|c| c.parse().ok())
        .collect::<Option<_>>()?;
    let mass = line
        .rsplit(' ')
        .next()?
        .trim_end_matches('.')
        .parse()
        .ok()?;
    Some(([coords[0], coords[1], coords[2]], mass))
}
