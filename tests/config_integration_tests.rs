//! Configuration file loading and merging with the command line
use std::io::Write;
use std::time::Duration;

use clap::Parser;
use gcode_streamer::config::{Args, Config, FileConfig, ProgramSource, UnitMode};
use gcode_streamer::optimizer::{Pass, Pipeline};
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("create temp file");
    file.write_all(content.as_bytes()).expect("write config");
    file
}

fn args(argv: &[&str]) -> Args {
    Args::try_parse_from(std::iter::once("gstream").chain(argv.iter().copied()))
        .expect("parse args")
}

#[test]
fn test_config_file_is_loaded() {
    let file = write_config(
        r#"
device = "/dev/ttyACM0"
baud_rate = 57600
units = "imperial"
max_feedrate = 1200.0
passes = ["comment-remover", "feedrate-patcher", "linear-move-saver"]
read_retries = 5
read_timeout_ms = 250
log_level = "debug"

[wire]
max_line_length = 64

[handshake]
max_attempts = 3
retry_delay_ms = 100
"#,
    );
    let path = file.path().to_str().expect("utf-8 path");

    let config = Config::from_args(args(&["--config", path, "-f", "part.nc"])).unwrap();

    assert_eq!(config.device.as_deref(), Some("/dev/ttyACM0"));
    assert_eq!(config.baud_rate, 57600);
    assert_eq!(config.units, UnitMode::Imperial);
    assert_eq!(config.max_feedrate, Some(1200.0));
    assert_eq!(
        config.pipeline.passes(),
        &[Pass::CommentRemover, Pass::FeedratePatcher, Pass::LinearMoveSaver]
    );
    assert_eq!(config.engine.read_retries, 5);
    assert_eq!(config.read_timeout, Duration::from_millis(250));
    assert_eq!(config.engine.wire.max_line_length, 64);
    assert_eq!(config.engine.handshake.max_attempts, Some(3));
    assert_eq!(config.engine.handshake.retry_delay, Duration::from_millis(100));
    assert_eq!(config.log_level, "debug");
    assert_eq!(config.source, ProgramSource::File("part.nc".into()));
}

#[test]
fn test_command_line_wins_over_file() {
    let file = write_config("baud_rate = 9600\nunits = \"imperial\"\nlog_level = \"warn\"\n");
    let path = file.path().to_str().unwrap();

    let config = Config::from_args(args(&[
        "--config",
        path,
        "-b",
        "115200",
        "-m",
        "--log-level",
        "trace",
        "--no-optimize",
    ]))
    .unwrap();

    assert_eq!(config.baud_rate, 115_200);
    assert_eq!(config.units, UnitMode::Metric);
    assert_eq!(config.log_level, "trace");
    assert_eq!(config.pipeline, Pipeline::empty());
}

#[test]
fn test_missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let result = Config::from_args(args(&["--config", path.to_str().unwrap()]));
    assert!(result.is_err());
}

#[test]
fn test_malformed_config_file_is_an_error() {
    let file = write_config("baud_rate = \"fast\"\n");
    assert!(FileConfig::load(file.path()).is_err());

    let file = write_config("[wire]\nmax_line_length = 40\nunknown = 1\n");
    assert!(FileConfig::load(file.path()).is_err());
}

#[test]
fn test_bad_pass_order_in_file_is_an_error() {
    let file = write_config("passes = [\"linear-move-saver\", \"feedrate-patcher\"]\n");
    let path = file.path().to_str().unwrap();
    let error = Config::from_args(args(&["--config", path])).unwrap_err();
    assert!(format!("{:#}", error).contains("invalid pass order"));
}
