//! Command-line front end
//!
//! Reads a program, optimizes it, prints the analysis report and streams
//! the result to the controller. Ctrl-C stops the send cycle and halts the
//! controller.

use std::io::Write as _;

use anyhow::{anyhow, Context, Result};
use tokio::io::AsyncReadExt;

use crate::analysis::{limit_feedrate, Report};
use crate::config::{Config, ProgramSource, ReportFormat};
use crate::parser::{self, Statement};
use crate::protocol::{Engine, ProtocolError, SendObserver, SendOutcome, SerialConnector};

/// Renders send progress on standard error
#[derive(Debug)]
pub struct ProgressPrinter {
    total: usize,
    last_percent: Option<usize>,
}

impl ProgressPrinter {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            last_percent: None,
        }
    }

    fn percent(&self, index: usize) -> usize {
        if self.total == 0 {
            100
        } else {
            (index + 1) * 100 / self.total
        }
    }
}

impl SendObserver for ProgressPrinter {
    fn on_progress(&mut self, index: usize) {
        let percent = self.percent(index);
        if self.last_percent != Some(percent) {
            self.last_percent = Some(percent);
            eprint!("\rBuffer: {:>3}% ({}/{})", percent, index + 1, self.total);
            let _ = std::io::stderr().flush();
        }
    }

    fn on_complete(&mut self) {
        eprintln!();
    }

    fn on_error(&mut self, payload: &str, statement: &Statement) {
        eprintln!("\nerror: {} at {}", payload, statement);
    }

    fn on_alarm(&mut self, payload: &str, statement: &Statement) {
        eprintln!("\nalarm: {} at {}", payload, statement);
    }
}

/// Load the program text; inline code uses ';' as line separator
pub async fn read_program(source: &ProgramSource) -> Result<String> {
    match source {
        ProgramSource::File(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            Ok(String::from_utf8_lossy(&bytes).into_owned())
        }
        ProgramSource::Inline(code) => Ok(code.replace(';', "\n")),
        ProgramSource::Stdin => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("failed to read program from standard input")?;
            Ok(text)
        }
    }
}

/// Parse, clamp and optimize a program according to the configuration
pub fn prepare(text: &str, config: &Config) -> Result<Vec<Statement>> {
    let mut statements = parser::parse(text).context("failed to parse program")?;
    if let Some(max) = config.max_feedrate {
        limit_feedrate(&mut statements, max);
    }
    let parsed = statements.len();
    let statements = config
        .pipeline
        .run(statements)
        .context("optimizer pipeline failed")?;
    log::info!("{} statements parsed, {} after optimization", parsed, statements.len());
    Ok(statements)
}

fn print_report(report: &Report, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Text => eprintln!("{}", report),
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(report)?),
    }
    Ok(())
}

/// Entry point of the `gstream` binary
pub async fn run() -> Result<()> {
    let config = Config::from_args_and_env()?;
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.log_level.as_str()),
    )
    .init();

    let text = read_program(&config.source).await?;
    let statements = prepare(&text, &config)?;
    print_report(&Report::analyze(&statements), config.report)?;

    if config.dry_run {
        for statement in &statements {
            println!("{}", statement.render(&config.engine.wire));
        }
        return Ok(());
    }

    let device = config
        .device
        .clone()
        .context("a serial device is required unless --dry-run is given")?;
    let connector =
        SerialConnector::new(device, config.baud_rate).with_read_timeout(config.read_timeout);
    let mut engine = Engine::new(connector, config.engine);

    let cancel = engine.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupted");
            cancel.cancel();
        }
    });

    let units = config.units.statement();
    let outcome = tokio::task::spawn_blocking(move || -> Result<SendOutcome> {
        match engine.connect() {
            Err(ProtocolError::Cancelled) => return Ok(SendOutcome::Cancelled { sent: 0 }),
            result => result?,
        }
        engine.enqueue(std::iter::once(units).chain(statements));
        let mut progress = ProgressPrinter::new(engine.queue_len());
        let outcome = engine.send_queue(&mut progress)?;
        if let SendOutcome::Cancelled { .. } = outcome {
            engine.halt()?;
        }
        Ok(outcome)
    })
    .await??;

    match outcome {
        SendOutcome::Completed { sent } => {
            log::info!("Program sent ({} statements)", sent);
            Ok(())
        }
        SendOutcome::Cancelled { sent } => {
            eprintln!("Stopped after {} statements", sent);
            Ok(())
        }
        SendOutcome::Faulted(fault) => Err(anyhow!(fault)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Args, FileConfig};
    use clap::Parser;

    fn config(argv: &[&str]) -> Config {
        let args = Args::try_parse_from(std::iter::once("gstream").chain(argv.iter().copied()))
            .expect("parse args");
        Config::merge(args, FileConfig::default()).expect("merge config")
    }

    #[tokio::test]
    async fn test_read_inline_program() {
        let source = ProgramSource::Inline("G21;G0 X1".to_string());
        assert_eq!(read_program(&source).await.unwrap(), "G21\nG0 X1");
    }

    #[test]
    fn test_prepare_clamps_and_optimizes() {
        let config = config(&["--max-feedrate", "500"]);
        let statements = prepare("(part)\nG1 X1 F800\nG1 X2 F800\n", &config).unwrap();
        let lines: Vec<String> = statements.iter().map(|s| s.to_string()).collect();
        assert_eq!(lines, vec!["F500", "G1X1", "X2"]);
    }

    #[test]
    fn test_prepare_without_optimization() {
        let config = config(&["--no-optimize"]);
        let statements = prepare("(part)\nG1 X1", &config).unwrap();
        assert_eq!(statements.len(), 2);
    }

    #[test]
    fn test_prepare_reports_parse_errors() {
        let config = config(&[]);
        let error = prepare("G1 X1 ; comment", &config).unwrap_err();
        assert!(error.to_string().contains("failed to parse program"));
    }

    #[test]
    fn test_progress_percent() {
        let printer = ProgressPrinter::new(4);
        assert_eq!(printer.percent(0), 25);
        assert_eq!(printer.percent(3), 100);
        assert_eq!(ProgressPrinter::new(0).percent(0), 100);
    }
}
