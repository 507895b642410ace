// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines with thread names and source locations
    #[default]
    Text,
    /// One JSON object per event, for log collectors
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("unknown log format: {other}"),
        }
    }
}

/// Install a text subscriber filtered at `log_level`.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    setup_logging_with(log_level, LogFormat::Text)
}

/// Install the process subscriber. Fails if one is already installed.
pub fn setup_logging_with(log_level: &str, format: LogFormat) -> anyhow::Result<()> {
    let registry = tracing_subscriber::registry().with(level_filter(log_level));
    match format {
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_names(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_thread_names(true),
            )
            .try_init()?,
    }
    Ok(())
}

/// `RUST_LOG` wins over `log_level`; an unparsable level falls back to `info`.
fn level_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}
