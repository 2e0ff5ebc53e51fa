//! CLI integration tests for the run, validate and list commands.
//!
//! Tests cover:
//! - Argument parsing and config overrides
//! - Full `run` with INI and CSV files on disk, both evaluation modes
//! - Exit codes for config, wiring, expression and data failures
//! - `validate` without any data directory

mod common;

use clap::Parser;
use common::*;
use lineflow::cli::{self, Cli};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::ExitCode;
use tempfile::TempDir;

fn exit_str(code: ExitCode) -> String {
    format!("{code:?}")
}

fn assert_exit(code: ExitCode, expected: u8) {
    assert_eq!(exit_str(code), exit_str(ExitCode::from(expected)));
}

fn run_cli(args: &[&str]) -> ExitCode {
    let mut argv = vec!["lineflow"];
    argv.extend_from_slice(args);
    cli::run(Cli::try_parse_from(argv).unwrap())
}

fn write_file(path: &Path, content: &str) {
    let mut f = fs::File::create(path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
}

fn write_bars(dir: &Path, symbol: &str, bars: &[OhlcvBar]) {
    let mut text = String::from("date,open,high,low,close,volume\n");
    for b in bars {
        text.push_str(&format!(
            "{},{},{},{},{},{}\n",
            b.date.format("%Y-%m-%d"),
            b.open,
            b.high,
            b.low,
            b.close,
            b.volume
        ));
    }
    write_file(&dir.join(format!("{symbol}.csv")), &text);
}

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new(indicators: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        fs::create_dir(&data).unwrap();
        write_bars(&data, "SPY", &wave_bars(60));
        let ini = format!(
            "[data]\ndirectory = {}\nsymbol = SPY\n\n[run]\nmode = once\nprecision = 4\n\n[indicators]\n{}",
            data.display(),
            indicators
        );
        write_file(&dir.path().join("cfg.ini"), &ini);
        Self { dir }
    }

    fn config(&self) -> String {
        self.dir.path().join("cfg.ini").display().to_string()
    }

    fn output(&self) -> String {
        self.dir.path().join("out.csv").display().to_string()
    }

    fn read_output(&self) -> Vec<Vec<String>> {
        let mut rdr = csv::Reader::from_path(self.output()).unwrap();
        let mut rows = vec![rdr.headers().unwrap().iter().map(String::from).collect()];
        for record in rdr.records() {
            rows.push(record.unwrap().iter().map(String::from).collect());
        }
        rows
    }
}

mod run_command {
    use super::*;

    const INDICATORS: &str = "fast = SMA(close, period=3)\nslow = SMA(close, period=8)\ncross = CrossOver(fast, slow)\n";

    #[test]
    fn writes_csv_with_date_and_line_columns() {
        let fx = Fixture::new(INDICATORS);
        let code = run_cli(&["run", "-c", &fx.config(), "-o", &fx.output()]);
        assert_exit(code, 0);

        let rows = fx.read_output();
        assert_eq!(rows.len(), 61);
        let header = &rows[0];
        assert_eq!(header[0], "date");
        assert!(header.contains(&"fast.sma".to_string()));
        assert!(header.contains(&"cross.crossover".to_string()));

        let fast = header.iter().position(|h| h == "fast.sma").unwrap();
        assert_eq!(rows[1][0], "2024-01-01");
        assert_eq!(rows[2][fast], "");
        assert!(!rows[3][fast].is_empty());
        // four decimal places
        assert_eq!(rows[3][fast].split('.').nth(1).map(str::len), Some(4));
    }

    #[test]
    fn modes_produce_identical_files() {
        let fx = Fixture::new(INDICATORS);
        assert_exit(run_cli(&["run", "-c", &fx.config(), "-o", &fx.output()]), 0);
        let once = fs::read_to_string(fx.output()).unwrap();
        assert_exit(
            run_cli(&["run", "-c", &fx.config(), "--mode", "next", "-o", &fx.output()]),
            0,
        );
        let next = fs::read_to_string(fx.output()).unwrap();
        assert_eq!(once, next);
    }

    #[test]
    fn extra_expressions_and_symbol_override() {
        let fx = Fixture::new(INDICATORS);
        write_bars(&fx.dir.path().join("data"), "QQQ", &wave_bars(10));
        let code = run_cli(&[
            "run",
            "-c",
            &fx.config(),
            "--symbol",
            "QQQ",
            "-e",
            "slow=SMA(close, period=2)",
            "-e",
            "spread = high - low",
            "-o",
            &fx.output(),
        ]);
        assert_exit(code, 0);
        let rows = fx.read_output();
        assert_eq!(rows.len(), 11);
        let spread = rows[0].iter().position(|h| h == "spread").unwrap();
        assert_eq!(rows[1][spread], "2.1000");
    }

    #[test]
    fn data_dir_override() {
        let fx = Fixture::new(INDICATORS);
        let other = fx.dir.path().join("other");
        fs::create_dir(&other).unwrap();
        write_bars(&other, "SPY", &wave_bars(5));
        let other = other.display().to_string();
        let code = run_cli(&["run", "-c", &fx.config(), "--data-dir", &other, "-o", &fx.output()]);
        assert_exit(code, 0);
        assert_eq!(fx.read_output().len(), 6);
    }

    #[test]
    fn missing_symbol_file_is_data_error() {
        let fx = Fixture::new(INDICATORS);
        let code = run_cli(&["run", "-c", &fx.config(), "--symbol", "NOPE", "-o", &fx.output()]);
        assert_exit(code, 5);
    }

    #[test]
    fn cycle_is_graph_error() {
        let fx = Fixture::new("a = b + 1\nb = a * 2\n");
        assert_exit(run_cli(&["run", "-c", &fx.config(), "-o", &fx.output()]), 3);
    }

    #[test]
    fn definition_named_after_indicator_runs() {
        let fx = Fixture::new("atr = ATR\nwide = atr * 2\n");
        assert_exit(run_cli(&["run", "-c", &fx.config(), "-o", &fx.output()]), 0);

        let rows = fx.read_output();
        let header = &rows[0];
        let atr = header.iter().position(|h| h == "atr.atr").unwrap();
        let wide = header.iter().position(|h| h == "wide").unwrap();
        let last = rows.last().unwrap();
        let atr_value: f64 = last[atr].parse().unwrap();
        let wide_value: f64 = last[wide].parse().unwrap();
        assert!((wide_value - 2.0 * atr_value).abs() < 1e-3);
    }

    #[test]
    fn bad_expression_is_parse_error() {
        let fx = Fixture::new("a = SMA(close, period=)\n");
        assert_exit(run_cli(&["run", "-c", &fx.config(), "-o", &fx.output()]), 4);
    }

    #[test]
    fn bad_parameter_is_config_error() {
        let fx = Fixture::new("a = SMA(close, period=0)\n");
        assert_exit(run_cli(&["run", "-c", &fx.config(), "-o", &fx.output()]), 2);
    }

    #[test]
    fn missing_config_file_is_config_error() {
        assert_exit(run_cli(&["run", "-c", "/nonexistent/cfg.ini"]), 2);
    }
}

mod validate_command {
    use super::*;

    #[test]
    fn valid_config_without_data() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfg.ini");
        write_file(
            &path,
            "[indicators]\nmacd = MACD(close)\nhist = macd.macd - macd.signal\n",
        );
        let path = path.display().to_string();
        assert_exit(run_cli(&["validate", "-c", &path]), 0);
    }

    #[test]
    fn unknown_line_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfg.ini");
        write_file(&path, "[indicators]\nx = MACD(close).nothing\n");
        let path = path.display().to_string();
        assert_exit(run_cli(&["validate", "-c", &path]), 3);
    }

    #[test]
    fn empty_indicators_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cfg.ini");
        write_file(&path, "[run]\nmode = once\n");
        let path = path.display().to_string();
        assert_exit(run_cli(&["validate", "-c", &path]), 2);
    }
}

mod list_command {
    use super::*;

    #[test]
    fn list_succeeds() {
        assert_exit(run_cli(&["list"]), 0);
    }
}
