//! Configuration management for the G-code streamer.
//!
//! Handles:
//! - Command-line argument parsing
//! - The optional TOML configuration file
//! - Merging both over built-in defaults (command line wins)

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;

use crate::optimizer::{Pass, Pipeline};
use crate::parser::{Code, Statement, WireFormat};
use crate::protocol::{EngineSettings, HandshakePolicy};

const DEFAULT_BAUD_RATE: u32 = 115_200;
const DEFAULT_READ_TIMEOUT_MS: u64 = 500;

/// Command-line arguments for the G-code streamer
#[derive(Debug, Parser)]
#[command(name = "gstream")]
#[command(about = "Optimize G-code programs and stream them to a Grbl controller")]
#[command(version)]
pub struct Args {
    /// Serial device the controller is attached to
    pub device: Option<String>,

    /// G-code file to send; standard input is read when neither -f nor -c is given
    #[arg(short = 'f', long = "file", conflicts_with = "code")]
    pub file: Option<PathBuf>,

    /// Inline G-code, lines separated by ';'
    #[arg(short = 'c', long = "code")]
    pub code: Option<String>,

    #[arg(short = 'b', long = "baudrate", help = "Serial baud rate [default: 115200]")]
    pub baud_rate: Option<u32>,

    /// Program coordinates are millimeters (G21)
    #[arg(short = 'm', long, conflicts_with = "imperial")]
    pub metric: bool,

    /// Program coordinates are inches (G20)
    #[arg(short = 'i', long)]
    pub imperial: bool,

    /// Clamp every feed rate to this value
    #[arg(long)]
    pub max_feedrate: Option<f64>,

    /// Longest line the controller accepts, newline included
    #[arg(long)]
    pub max_line_length: Option<usize>,

    /// Optimizer pass to run, repeat to build a pipeline in order
    #[arg(long = "pass", value_enum)]
    pub passes: Vec<Pass>,

    /// Send the program exactly as parsed
    #[arg(long, conflicts_with = "passes")]
    pub no_optimize: bool,

    /// Print the optimized program instead of sending it
    #[arg(long)]
    pub dry_run: bool,

    /// Format of the analysis report
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub report: ReportFormat,

    /// Configuration file (defaults to <config dir>/gstream/config.toml)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Log level (trace, debug, info, warn, error)")]
    pub log_level: Option<String>,
}

/// How the analysis report is printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

/// Unit mode announced to the controller before the program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitMode {
    Metric,
    Imperial,
}

impl UnitMode {
    /// The `G21`/`G20` statement selecting this mode
    pub fn statement(self) -> Statement {
        let code = match self {
            UnitMode::Metric => 21,
            UnitMode::Imperial => 20,
        };
        Statement::from_codes([Code::int('G', code)])
    }
}

/// `[wire]` table of the configuration file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WireSection {
    pub max_line_length: Option<usize>,
    pub min_token_width: Option<usize>,
}

/// `[handshake]` table of the configuration file
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct HandshakeSection {
    /// `0` retries forever
    pub max_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub banner_timeout_ms: Option<u64>,
}

/// Contents of the TOML configuration file; every key is optional
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub device: Option<String>,
    pub baud_rate: Option<u32>,
    pub units: Option<UnitMode>,
    pub max_feedrate: Option<f64>,
    pub passes: Option<Vec<Pass>>,
    pub read_retries: Option<u32>,
    pub read_timeout_ms: Option<u64>,
    pub log_level: Option<String>,
    pub wire: WireSection,
    pub handshake: HandshakeSection,
}

impl FileConfig {
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("invalid configuration file")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = Self::parse(&content)?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load the default file if it exists
    pub fn load_default() -> Result<Self> {
        match Config::default_path() {
            Some(path) if path.is_file() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }
}

/// Where the program text comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ProgramSource {
    File(PathBuf),
    Inline(String),
    Stdin,
}

/// Combined configuration from all sources
#[derive(Debug, Clone)]
pub struct Config {
    pub device: Option<String>,
    pub source: ProgramSource,
    pub baud_rate: u32,
    pub units: UnitMode,
    pub max_feedrate: Option<f64>,
    pub pipeline: Pipeline,
    pub engine: EngineSettings,
    pub read_timeout: Duration,
    pub dry_run: bool,
    pub report: ReportFormat,
    pub log_level: String,
}

impl Config {
    /// Create configuration from command-line arguments
    pub fn from_args_and_env() -> Result<Self> {
        Self::from_args(Args::parse())
    }

    /// Create configuration from explicit arguments, loading the config file they name
    pub fn from_args(args: Args) -> Result<Self> {
        let file = match &args.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::load_default()?,
        };
        Self::merge(args, file)
    }

    /// `<config dir>/gstream/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gstream").join("config.toml"))
    }

    /// Merge arguments over the file over defaults
    pub fn merge(args: Args, file: FileConfig) -> Result<Self> {
        let source = match (args.file, args.code) {
            (Some(path), _) => ProgramSource::File(path),
            (None, Some(code)) => ProgramSource::Inline(code),
            (None, None) => ProgramSource::Stdin,
        };

        let units = if args.imperial {
            UnitMode::Imperial
        } else if args.metric {
            UnitMode::Metric
        } else {
            file.units.unwrap_or(UnitMode::Metric)
        };

        let pipeline = if args.no_optimize {
            Pipeline::empty()
        } else if !args.passes.is_empty() {
            Pipeline::new(args.passes)?
        } else if let Some(passes) = file.passes {
            Pipeline::new(passes).context("invalid pass order in configuration file")?
        } else {
            Pipeline::canonical()
        };

        let defaults = EngineSettings::default();
        let wire = WireFormat {
            max_line_length: args
                .max_line_length
                .or(file.wire.max_line_length)
                .unwrap_or(defaults.wire.max_line_length),
            min_token_width: file
                .wire
                .min_token_width
                .unwrap_or(defaults.wire.min_token_width),
        };
        let handshake = HandshakePolicy {
            max_attempts: match file.handshake.max_attempts {
                Some(0) => None,
                Some(n) => Some(n),
                None => defaults.handshake.max_attempts,
            },
            retry_delay: file
                .handshake
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.handshake.retry_delay),
            banner_timeout: file
                .handshake
                .banner_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.handshake.banner_timeout),
        };

        Ok(Config {
            device: args.device.or(file.device),
            source,
            baud_rate: args.baud_rate.or(file.baud_rate).unwrap_or(DEFAULT_BAUD_RATE),
            units,
            max_feedrate: args.max_feedrate.or(file.max_feedrate),
            pipeline,
            engine: EngineSettings {
                wire,
                handshake,
                read_retries: file.read_retries.unwrap_or(defaults.read_retries),
            },
            read_timeout: Duration::from_millis(
                file.read_timeout_ms.unwrap_or(DEFAULT_READ_TIMEOUT_MS),
            ),
            dry_run: args.dry_run,
            report: args.report,
            log_level: args
                .log_level
                .or(file.log_level)
                .unwrap_or_else(|| "info".to_string()),
        })
    }
}
