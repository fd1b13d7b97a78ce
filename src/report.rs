use crate::{
    config::Config,
    error::Result,
    mass_point::MassPoint,
    reduction::reduce,
    utils::loader::load_file,
};
use serde::Serializer;
use serde_derive::Serialize;
use std::fmt::Write;
use std::path::Path;
use std::time::Duration;

/// Outcome of a full run: what was loaded, where the barycenter is, and how
/// long each half took.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub loaded: usize,
    pub skipped: usize,
    #[serde(rename = "load_seconds", serialize_with = "as_secs")]
    pub load_time: Duration,
    pub barycenter: MassPoint,
    pub rounds: usize,
    #[serde(rename = "reduction_seconds", serialize_with = "as_secs")]
    pub reduction_time: Duration,
}

/// Loads `path` and reduces it to its barycenter.
pub fn run(path: impl AsRef<Path>, config: &Config) -> Result<Report> {
    let load = load_file(path, config)?;
    let loaded = load.points.len();
    let reduction = reduce(load.points, &config.reduce)?;

    Ok(Report {
        loaded,
        skipped: load.lines_skipped,
        load_time: load.elapsed,
        barycenter: reduction.point,
        rounds: reduction.rounds,
        reduction_time: reduction.elapsed,
    })
}

impl Report {
    /// The three human-readable lines printed by the command line tool.
    pub fn render_text(&self) -> String {
        let p = &self.barycenter;
        let mut text = String::new();
        // Writing into a String never fails
        let _ = writeln!(
            text,
            "Loaded {} values from file in {:?}.",
            self.loaded, self.load_time
        );
        let _ = writeln!(
            text,
            "System barycenter is at ({:.6}, {:.6}, {:.6}) and the system's mass is {:.6}.",
            p.x(),
            p.y(),
            p.z(),
            p.mass()
        );
        let _ = writeln!(text, "Calculation took {:?}.", self.reduction_time);
        text
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

fn as_secs<S: Serializer>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
}

#[cfg(test)]
fn sample() -> Report {
    Report {
        loaded: 2,
        skipped: 1,
        load_time: Duration::from_millis(1500),
        barycenter: MassPoint::new(1.0, 0.0, 0.0, 2.0),
        rounds: 1,
        reduction_time: Duration::from_micros(3),
    }
}

#[test]
fn test_render_text() {
    let text = sample().render_text();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "Loaded 2 values from file in 1.5s.");
    assert_eq!(
        lines[1],
        "System barycenter is at (1.000000, 0.000000, 0.000000) and the system's mass is 2.000000."
    );
    assert_eq!(lines[2], "Calculation took 3µs.");
}

#[test]
fn test_to_json() {
    let json: serde_json::Value = serde_json::from_str(&sample().to_json().unwrap()).unwrap();
    assert_eq!(json["loaded"], 2);
    assert_eq!(json["skipped"], 1);
    assert_eq!(json["load_seconds"], 1.5);
    assert_eq!(json["rounds"], 1);
    assert_eq!(json["barycenter"]["x"], 1.0);
    assert_eq!(json["barycenter"]["mass"], 2.0);
}

#[test]
fn test_run_end_to_end() {
    use std::io::Write;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "0:0:0:1\n2:0:0:1\n").unwrap();

    let report = run(file.path(), &Config::default()).unwrap();
    assert_eq!(report.loaded, 2);
    assert_eq!(report.barycenter, MassPoint::new(1.0, 0.0, 0.0, 2.0));
    assert_eq!(report.rounds, 1);
}

#[test]
fn test_run_empty_file_fails_before_reduction() {
    let file = tempfile::NamedTempFile::new().unwrap();
    assert!(matches!(
        run(file.path(), &Config::default()),
        Err(crate::error::Error::InsufficientData)
    ));
}
