//! Tracing setup for the command line.
//!
//! Everything is decided from the command line before the first event:
//! the filter, whether stderr gets log lines and whether a log file is
//! appended to. Stdout is left to command output.

use std::fmt;
use std::fs::File;
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::{
    EnvFilter,
    fmt::{
        FmtContext,
        format::{FormatEvent, FormatFields, Writer},
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
};

const DEFAULT_FILTER: &str = "info";

/// Logging choices taken from the global command-line options.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogOptions<'a> {
    /// `EnvFilter` directive; falls back to `RUST_LOG`, then `info`.
    pub level: Option<&'a str>,
    /// No log lines on stderr.
    pub quiet: bool,
    pub file: Option<&'a Path>,
}

/// `12:04:31.207 WARN  vrijekas_core: message key=value`
struct LineFormat;

impl LineFormat {
    fn level_color(level: Level) -> &'static str {
        match level {
            Level::ERROR => "31",
            Level::WARN => "33",
            Level::INFO => "32",
            Level::DEBUG => "34",
            Level::TRACE => "35",
        }
    }
}

impl<S, N> FormatEvent<S, N> for LineFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let time = Local::now().format("%H:%M:%S%.3f");
        let level = format!("{:<5}", meta.level().as_str());
        let crate_name = meta.target().split("::").next().unwrap_or_default();

        if writer.has_ansi_escapes() {
            let color = Self::level_color(*meta.level());
            write!(writer, "\x1b[2m{time}\x1b[0m \x1b[{color}m{level}\x1b[0m {crate_name}: ")?;
        } else {
            write!(writer, "{time} {level} {crate_name}: ")?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

fn build_filter(level: Option<&str>) -> Result<EnvFilter> {
    match level {
        Some(directive) => EnvFilter::try_new(directive)
            .with_context(|| format!("Invalid log level '{directive}'")),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

fn build_subscriber(options: &LogOptions<'_>) -> Result<impl Subscriber + Send + Sync + 'static> {
    let filter = build_filter(options.level)?;

    let console = (!options.quiet).then(|| {
        tracing_subscriber::fmt::layer()
            .event_format(LineFormat)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
    });

    let file = match options.file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Cannot open log file '{}'", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .event_format(LineFormat)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    Ok(tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file))
}

/// Installs the process-wide subscriber. Call once, before any command runs.
pub fn init(options: &LogOptions<'_>) -> Result<()> {
    build_subscriber(options)?
        .try_init()
        .context("Logging is already initialised")
}
