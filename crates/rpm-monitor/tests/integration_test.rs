use std::io::Write;
use std::process::{Command, Output};

fn monitor_bin() -> String {
    std::env::var("CARGO_BIN_EXE_rpm-monitor").unwrap_or_else(|_| {
        let candidates = [
            "../../target/debug/rpm-monitor",
            "target/debug/rpm-monitor",
            "../../target/release/rpm-monitor",
            "target/release/rpm-monitor",
        ];
        for candidate in candidates {
            if std::path::Path::new(candidate).exists() {
                return candidate.to_string();
            }
        }
        panic!("Failed to locate rpm-monitor binary. Expected CARGO_BIN_EXE_rpm-monitor.");
    })
}

fn run_monitor(args: &[&str]) -> Output {
    Command::new(monitor_bin())
        .args(args)
        .arg("--json-logs")
        .env("RUST_LOG", "info")
        .output()
        .expect("Failed to run rpm-monitor")
}

#[test]
fn help_prints_usage() {
    let output = run_monitor(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("USAGE:"));
    assert!(stdout.contains("--debounce-ms"));
}

fn json_lines(stdout: &str) -> Vec<serde_json::Value> {
    stdout
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .unwrap_or_else(|e| panic!("non-JSON log line {line:?}: {e}"))
        })
        .collect()
}

fn event<'a>(lines: &'a [serde_json::Value], message: &str) -> Vec<&'a serde_json::Value> {
    lines
        .iter()
        .filter(|l| l["fields"]["message"] == message)
        .map(|l| &l["fields"])
        .collect()
}

#[test]
fn short_run_reports_rpm_and_exits_cleanly() {
    let output = run_monitor(&[
        "--run-seconds",
        "2",
        "--interval-ms",
        "250",
        "--report-ms",
        "100",
        "--sim-rpm",
        "1200",
        "--sim-bounce",
        "2",
    ]);
    assert!(output.status.success(), "status: {:?}", output.status);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("RPM sensor initialized on GPIO 4"));
    let lines = json_lines(&stdout);

    let readings: Vec<f64> = event(&lines, "RPM")
        .iter()
        .filter_map(|fields| fields["rpm"].as_f64())
        .collect();
    assert!(readings.len() >= 3, "too few readings: {readings:?}");
    // Counting bounce edges would read about three times the shaft speed.
    assert!(
        readings.iter().all(|rpm| *rpm < 2400.0),
        "bounce leaked into readings: {readings:?}"
    );
    let settled = &readings[1..];
    let mean = settled.iter().sum::<f64>() / settled.len() as f64;
    assert!((800.0..=1600.0).contains(&mean), "mean rpm {mean} from {readings:?}");

    let complete = event(&lines, "Run complete");
    assert_eq!(complete.len(), 1);
    let counted = complete[0]["pulses_counted"].as_u64().unwrap();
    let emitted = complete[0]["pulses_emitted"].as_u64().unwrap();
    assert!(emitted > 0);
    assert!(counted <= emitted, "counted {counted} of {emitted} passes");
}

#[test]
fn zero_interval_is_rejected() {
    let output = run_monitor(&["--interval-ms", "0", "--run-seconds", "1"]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Invalid sensor configuration"));
    assert!(!stdout.contains("Run complete"));
}

#[test]
fn config_file_pin_is_used() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"{{ "pin": 12, "calc_interval_ms": 250 }}"#).unwrap();
    let path = file.path().to_string_lossy().into_owned();

    let output = run_monitor(&["--config", &path, "--run-seconds", "1"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("RPM sensor initialized on GPIO 12"));
}

#[test]
fn pin_outside_simulated_bank_fails_initialization() {
    let output = run_monitor(&["--pin", "99", "--run-seconds", "1"]);
    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Failed to initialize RPM sensor"));
}
