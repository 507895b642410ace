// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::event::CreateFlags;
use crate::logging::{LogFormat, setup_logging_with};
use crate::stream::DEFAULT_CHANNEL_CAPACITY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Paths to watch recursively
    pub paths: Vec<PathBuf>,

    /// Coalescing window in milliseconds
    pub latency_ms: u64,

    /// Report individual files instead of their directories
    pub file_events: bool,

    /// Deliver the first event after a quiet period immediately
    pub no_defer: bool,

    /// Report when a watched root itself is created, removed or renamed
    pub watch_root: bool,

    /// Batches buffered before delivery starts dropping
    pub channel_capacity: usize,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Logging output, `text` or `json`
    pub log_format: LogFormat,
}

impl WatchConfig {
    /// Load configuration from TOML file with environment variable overrides
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Same as [`load`](Self::load), reading variables through `lookup`.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let config_path = lookup("FSEVENTS_CONFIG").unwrap_or_else(|| "fsevents.toml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            Self::from_file(Path::new(&config_path))?
        } else {
            // Use default configuration
            WatchConfig::default()
        };
        config.apply_overrides(lookup)?;

        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<()> {
        if let Some(val) = lookup("FSEVENTS_PATHS") {
            self.paths = std::env::split_paths(&val).collect();
        }
        if let Some(val) = lookup("FSEVENTS_LATENCY_MS") {
            self.latency_ms = val.parse()?;
        }
        if let Some(val) = lookup("FSEVENTS_FILE_EVENTS") {
            self.file_events = val.parse()?;
        }
        if let Some(val) = lookup("FSEVENTS_NO_DEFER") {
            self.no_defer = val.parse()?;
        }
        if let Some(val) = lookup("FSEVENTS_WATCH_ROOT") {
            self.watch_root = val.parse()?;
        }
        if let Some(val) = lookup("FSEVENTS_CHANNEL_CAPACITY") {
            self.channel_capacity = val.parse()?;
        }
        if let Some(val) = lookup("FSEVENTS_LOG_LEVEL") {
            self.log_level = val;
        }
        if let Some(val) = lookup("FSEVENTS_LOG_FORMAT") {
            self.log_format = val.parse()?;
        }
        Ok(())
    }

    /// Install the process subscriber using `log_level` and `log_format`.
    pub fn init_logging(&self) -> anyhow::Result<()> {
        setup_logging_with(&self.log_level, self.log_format)
    }

    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }

    pub fn create_flags(&self) -> CreateFlags {
        let mut flags = CreateFlags::empty();
        flags.set(CreateFlags::FILE_EVENTS, self.file_events);
        flags.set(CreateFlags::NO_DEFER, self.no_defer);
        flags.set(CreateFlags::WATCH_ROOT, self.watch_root);
        flags
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            paths: vec![PathBuf::from(".")],
            latency_ms: 100,
            file_events: true,
            no_defer: false,
            watch_root: false,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            log_level: String::from("info"),
            log_format: LogFormat::Text,
        }
    }
}
