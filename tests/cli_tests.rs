mod common;
use common::*;

#[test]
fn test_help_flag() {
    let (stdout, _stderr, exit_code) = run_barycenter(&["--help"]);
    assert_eq!(exit_code, 0, "barycenter --help should exit successfully");
    assert!(stdout.contains("barycenter"), "Help should name the tool");
    assert!(stdout.contains("--strategy"), "Help should mention the strategy option");
}

#[test]
fn test_missing_argument_exits_with_one() {
    let (stdout, stderr, exit_code) = run_barycenter(&[]);
    assert_eq!(exit_code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.contains("Usage"), "stderr was: {stderr}");
}

#[test]
fn test_too_many_arguments_exits_with_one() {
    let (_stdout, _stderr, exit_code) = run_barycenter(&["a.txt", "b.txt"]);
    assert_eq!(exit_code, 1);
}

#[test]
fn test_two_unit_masses() {
    let (stdout, stderr, exit_code) = run_barycenter_with_file(&[], "0:0:0:1\n2:0:0:1\n");
    assert_eq!(exit_code, 0, "stderr was: {stderr}");
    assert!(stdout.starts_with("Loaded 2 values from file in "));
    assert!(stdout.contains(
        "System barycenter is at (1.000000, 0.000000, 0.000000) and the system's mass is 2.000000."
    ));
    assert!(stdout.contains("Calculation took "));
}

#[test]
fn test_coincident_points_every_strategy() {
    for strategy in ["sequential", "threaded", "async"] {
        let (stdout, stderr, exit_code) = run_barycenter_with_file(
            &["--strategy", strategy],
            "0:0:0:1\n0:0:0:1\n0:0:0:2\n",
        );
        assert_eq!(exit_code, 0, "{strategy}: {stderr}");
        let (position, mass) = parse_barycenter_line(&stdout).expect("no barycenter line");
        assert_eq!(position, [0.0, 0.0, 0.0], "{strategy}");
        assert_eq!(mass, 4.0, "{strategy}");
    }
}

#[test]
fn test_malformed_line_is_skipped() {
    let (stdout, _stderr, exit_code) =
        run_barycenter_with_file(&[], "1:2:3:4\ngarbage\n5:6:7:8\n");
    assert_eq!(exit_code, 0);
    assert!(stdout.starts_with("Loaded 2 values"), "stdout was: {stdout}");
}

#[test]
fn test_strict_fails_on_malformed_line() {
    let (stdout, stderr, exit_code) =
        run_barycenter_with_file(&["--strict"], "1:2:3:4\ngarbage\n5:6:7:8\n");
    assert_eq!(exit_code, 1);
    assert!(!stdout.contains("System barycenter"));
    assert!(stderr.contains("malformed line 2"), "stderr was: {stderr}");
}

#[test]
fn test_empty_input_is_fatal() {
    let (stdout, stderr, exit_code) = run_barycenter_with_file(&[], "nothing\nto see\n");
    assert_eq!(exit_code, 1);
    assert!(!stdout.contains("System barycenter"));
    assert!(stderr.contains("insufficient values"), "stderr was: {stderr}");
}

#[test]
fn test_missing_file_is_fatal() {
    let (stdout, stderr, exit_code) = run_barycenter(&["/definitely/not/a/file.txt"]);
    assert_eq!(exit_code, 1);
    assert!(stdout.is_empty());
    assert!(stderr.contains("couldn't open"), "stderr was: {stderr}");
}

#[test]
fn test_zero_mass_is_fatal_unless_allowed() {
    let input = "1:0:0:1\n-1:0:0:-1\n";

    let (stdout, stderr, exit_code) = run_barycenter_with_file(&[], input);
    assert_eq!(exit_code, 1);
    assert!(!stdout.contains("System barycenter"));
    assert!(stderr.contains("degenerate mass"), "stderr was: {stderr}");

    let (stdout, _stderr, exit_code) = run_barycenter_with_file(&["--allow-nan"], input);
    assert_eq!(exit_code, 0);
    assert!(stdout.contains("System barycenter"));
    assert!(stdout.contains("NaN"), "stdout was: {stdout}");
}

#[test]
fn test_overflowing_position_is_fatal() {
    let (stdout, stderr, exit_code) =
        run_barycenter_with_file(&[], "1e300:0:0:1e10\n-1e300:0:0:1e10\n");
    assert_eq!(exit_code, 1);
    assert!(!stdout.contains("System barycenter"));
    assert!(stderr.contains("non-finite position"), "stderr was: {stderr}");

    let (stdout, stderr, exit_code) =
        run_barycenter_with_file(&["--allow-nan"], "1e300:0:0:1e10\n-1e300:0:0:1e10\n");
    assert_eq!(exit_code, 0);
    assert!(stdout.contains("NaN"), "stdout was: {stdout}");
    assert!(stderr.contains("barycenter is not finite"), "stderr was: {stderr}");
    assert!(!stderr.contains("summed to zero"), "stderr was: {stderr}");
}

#[test]
fn test_json_nan_is_a_string() {
    let (stdout, _stderr, exit_code) =
        run_barycenter_with_file(&["--json", "--allow-nan"], "1:0:0:1\n-1:0:0:-1\n");
    assert_eq!(exit_code, 0);

    let json: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("Output should be valid JSON");
    assert_eq!(json["barycenter"]["x"], "inf");
    assert_eq!(json["barycenter"]["y"], "NaN");
    assert_eq!(json["barycenter"]["mass"], 0.0);
}

#[test]
fn test_json_output() {
    let (stdout, _stderr, exit_code) =
        run_barycenter_with_file(&["--json", "--parallel-reduce"], "0:0:0:1\n2:0:0:1\nbad\n");
    assert_eq!(exit_code, 0);

    let json: serde_json::Value =
        serde_json::from_str(stdout.trim()).expect("Output should be valid JSON");
    assert_eq!(json["loaded"], 2);
    assert_eq!(json["skipped"], 1);
    assert_eq!(json["rounds"], 1);
    assert_eq!(json["barycenter"]["x"], 1.0);
    assert_eq!(json["barycenter"]["y"], 0.0);
    assert_eq!(json["barycenter"]["mass"], 2.0);
    assert!(json["load_seconds"].is_number());
}

#[test]
fn test_log_file_receives_logs() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("barycenter.log");
    let log_arg = log_path.to_str().unwrap();

    let (_stdout, _stderr, exit_code) =
        run_barycenter_with_file(&["--log-file", log_arg], "0:0:0:1\n2:0:0:1\n");
    assert_eq!(exit_code, 0);

    let logs = std::fs::read_to_string(&log_path).unwrap();
    assert!(logs.contains("loaded 2 points"), "log was: {logs}");
}
