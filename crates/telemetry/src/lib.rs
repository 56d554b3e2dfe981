//! Tracing bootstrap shared by the provisioning binaries.
//!
//! Logs always go to stderr so stdout carries only the status line.

use std::str::FromStr;

use once_cell::sync::OnceCell;
use provision_kernel::settings::{LogFormat, TelemetrySettings};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static INSTALLED: OnceCell<()> = OnceCell::new();

#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("invalid log level: {0}")]
    InvalidLevel(#[from] tracing_subscriber::filter::ParseError),
    #[error("failed to init logger: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Build the filter, preferring `RUST_LOG` over the configured level.
pub fn env_filter(level: &str) -> Result<EnvFilter, TelemetryError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    Ok(EnvFilter::from_str(directives(rust_log.as_deref(), level))?)
}

fn directives<'a>(rust_log: Option<&'a str>, level: &'a str) -> &'a str {
    match rust_log {
        Some(value) if !value.trim().is_empty() => value,
        _ => level,
    }
}

/// Install the global subscriber. Later calls are no-ops.
pub fn init(settings: &TelemetrySettings) -> Result<(), TelemetryError> {
    INSTALLED.get_or_try_init(|| {
        let filter = env_filter(&settings.level)?;
        let builder = tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter);

        match settings.log_format {
            LogFormat::Pretty => builder.pretty().finish().try_init()?,
            LogFormat::Json => builder.json().finish().try_init()?,
            LogFormat::Compact => builder.compact().finish().try_init()?,
        }

        tracing::debug!(
            target: "provision-telemetry",
            format = ?settings.log_format,
            "telemetry initialized"
        );

        Ok::<_, TelemetryError>(())
    })?;

    Ok(())
}
