use rpm_core::{ConfigError, IntervalBasis, PinId, SensorConfig};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub run_seconds: Option<u64>,
    pub json_logs: bool,
    pub config_path: Option<PathBuf>,
    pub pin: Option<PinId>,
    pub debounce_ms: Option<u64>,
    pub interval_ms: Option<u64>,
    pub pulses_per_revolution: Option<u32>,
    pub nominal_interval: bool,
    pub sim_rpm: f64,
    pub sim_bounce: u32,
    pub report_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            run_seconds: None,
            json_logs: false,
            config_path: None,
            pin: None,
            debounce_ms: None,
            interval_ms: None,
            pulses_per_revolution: None,
            nominal_interval: false,
            sim_rpm: 1200.0,
            sim_bounce: 2,
            report_ms: 1000,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Self {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--config" => {
                    if i + 1 < args.len() {
                        cfg.config_path = Some(PathBuf::from(&args[i + 1]));
                        i += 1;
                    }
                }
                "--pin" => {
                    if i + 1 < args.len() {
                        cfg.pin = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                "--debounce-ms" => {
                    if i + 1 < args.len() {
                        cfg.debounce_ms = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                "--interval-ms" => {
                    if i + 1 < args.len() {
                        cfg.interval_ms = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                "--pulses-per-rev" => {
                    if i + 1 < args.len() {
                        cfg.pulses_per_revolution = args[i + 1].parse().ok();
                        i += 1;
                    }
                }
                "--nominal-interval" => {
                    cfg.nominal_interval = true;
                }
                "--sim-rpm" => {
                    if i + 1 < args.len() {
                        cfg.sim_rpm = args[i + 1].parse().unwrap_or(cfg.sim_rpm);
                        i += 1;
                    }
                }
                "--sim-bounce" => {
                    if i + 1 < args.len() {
                        cfg.sim_bounce = args[i + 1].parse().unwrap_or(cfg.sim_bounce);
                        i += 1;
                    }
                }
                "--report-ms" => {
                    if i + 1 < args.len() {
                        cfg.report_ms = args[i + 1].parse().unwrap_or(cfg.report_ms);
                        i += 1;
                    }
                }
                "--run-seconds" => {
                    if i + 1 < args.len() {
                        cfg.run_seconds = args[i + 1].parse::<u64>().ok();
                        i += 1;
                    }
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                _ => {}
            }
            i += 1;
        }
        cfg
    }

    /// Sensor settings: the config file if given, else defaults, with
    /// command-line values on top.
    pub fn sensor_config(&self) -> Result<SensorConfig, ConfigError> {
        let mut sensor = match &self.config_path {
            Some(path) => SensorConfig::from_json_file(path)?,
            None => SensorConfig::default(),
        };
        if let Some(pin) = self.pin {
            sensor.pin = pin;
        }
        if let Some(debounce_ms) = self.debounce_ms {
            sensor.debounce_ms = debounce_ms;
        }
        if let Some(interval_ms) = self.interval_ms {
            sensor.calc_interval_ms = interval_ms;
        }
        if let Some(ppr) = self.pulses_per_revolution {
            sensor.pulses_per_revolution = ppr;
        }
        if self.nominal_interval {
            sensor.interval_basis = IntervalBasis::Nominal;
        }
        sensor.validate()?;
        Ok(sensor)
    }

    /// Reporter period, never shorter than 1 ms.
    pub fn report_period(&self) -> Duration {
        Duration::from_millis(self.report_ms.max(1))
    }

    pub fn print_help() {
        println!(
            r#"rpm-monitor - Hall-effect RPM sensor runtime (simulated GPIO)

USAGE:
    rpm-monitor [OPTIONS]

OPTIONS:
    --config <PATH>         Load sensor settings from a JSON file
    --pin <N>               Sensor input GPIO [default: 4]
    --debounce-ms <MS>      Minimum accepted spacing between pulses [default: 10]
    --interval-ms <MS>      RPM calculation period [default: 1000]
    --pulses-per-rev <N>    Magnets per revolution [default: 1]
    --nominal-interval      Divide by the configured period instead of the measured one
    --sim-rpm <RPM>         Simulated shaft speed [default: 1200]
    --sim-bounce <N>        Extra bounce edges per magnet pass [default: 2]
    --report-ms <MS>        How often the reporter logs the current RPM [default: 1000]
    --run-seconds <SECS>    Run for a fixed duration then exit
    --json-logs             Output logs in JSON format
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log filter (e.g., RUST_LOG=debug,rpm_core=trace)

EXAMPLES:
    # Two-magnet wheel at 3000 RPM for ten seconds
    rpm-monitor --pulses-per-rev 2 --sim-rpm 3000 --run-seconds 10

    # Settings from file, JSON logs
    rpm-monitor --config sensor.json --json-logs
"#
        );
    }
}
