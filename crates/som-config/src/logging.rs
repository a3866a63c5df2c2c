//! Tracing subscriber initialization
//!
//! # Filter priority (highest to lowest)
//!
//! 1. `SOM_LOG` env var (per-target directives, e.g. `som_migrator=debug,warn`)
//! 2. `RUST_LOG` env var
//! 3. [`LoggingSettings::level`]

use crate::error::ConfigError;
use crate::settings::{LogFormat, LoggingSettings};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Project-specific filter variable
pub const LOG_ENV_VAR: &str = "SOM_LOG";

/// Install the global tracing subscriber
///
/// # Errors
/// - [`ConfigError::Logging`] if the log file cannot be opened or a global
///   subscriber is already installed
pub fn init_tracing(settings: &LoggingSettings) -> Result<(), ConfigError> {
    let filter = build_env_filter(settings);

    let writer = match &settings.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| ConfigError::Logging(format!("{}: {e}", path.display())))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };
    let use_ansi = settings.file.is_none();

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match settings.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(writer))
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(use_ansi)
                    .with_target(true),
            )
            .try_init(),
    };

    installed.map_err(|e| ConfigError::Logging(e.to_string()))
}

/// Build the filter respecting `SOM_LOG` > `RUST_LOG` > configured level
///
/// Unparseable directives fall through to the next source.
#[must_use]
pub fn build_env_filter(settings: &LoggingSettings) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV_VAR) {
        if let Ok(filter) = EnvFilter::try_new(directives) {
            return filter;
        }
    }

    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }

    EnvFilter::try_new(&settings.level).unwrap_or_else(|_| EnvFilter::new("info"))
}
