//! Application configuration, read from an optional RON file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use carousel_core::PollSettings;
use carousel_engine::{
    ClientSettings, EndpointTable, Endpoints, FileStore, HistorySettings, RetryPolicy,
};
use carousel_logging::LogDestination;
use log::LevelFilter;
use serde::Deserialize;

pub(crate) const DEFAULT_CONFIG_FILE: &str = "./carousel.ron";

const WEBHOOK_BASE: &str = "https://n8n-vogmx0uye8x5.arman.sumopod.my.id/webhook";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub(crate) struct AppConfig {
    pub idea: EndpointConfig,
    pub script: EndpointConfig,
    pub retry: RetryConfig,
    pub poll: PollConfig,
    pub http: HttpConfig,
    pub storage: StorageConfig,
    pub history: HistoryConfig,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            idea: EndpointConfig {
                submit: format!("{WEBHOOK_BASE}/v6"),
                status: format!("{WEBHOOK_BASE}/polling-v6"),
            },
            script: EndpointConfig {
                submit: format!("{WEBHOOK_BASE}/skrip-submit"),
                status: format!("{WEBHOOK_BASE}/skrip-status"),
            },
            retry: RetryConfig::default(),
            poll: PollConfig::default(),
            http: HttpConfig::default(),
            storage: StorageConfig::default(),
            history: HistoryConfig::default(),
            log: LogConfig::default(),
        }
    }
}

/// Both URLs are required once a mode's section is present.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub(crate) struct EndpointConfig {
    pub submit: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct PollConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
    pub max_consecutive_errors: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5000,
            max_attempts: 60,
            max_consecutive_errors: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct HttpConfig {
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub max_download_bytes: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            max_download_bytes: 25 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct StorageConfig {
    pub dir: PathBuf,
    /// Combined size cap for stored values; `None` disables it.
    pub quota_bytes: Option<u64>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./carousel_data"),
            quota_bytes: Some(5 * 1024 * 1024),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct HistoryConfig {
    pub capacity: usize,
    pub degraded_capacity: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        let settings = HistorySettings::default();
        Self {
            capacity: settings.capacity,
            degraded_capacity: settings.degraded_capacity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum LogTarget {
    #[default]
    File,
    Terminal,
    Both,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub(crate) struct LogConfig {
    pub destination: LogTarget,
    pub file: PathBuf,
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            destination: LogTarget::File,
            file: PathBuf::from(carousel_logging::DEFAULT_LOG_FILE),
            level: "info".to_string(),
        }
    }
}

impl LogConfig {
    pub fn destination(&self) -> LogDestination {
        match self.destination {
            LogTarget::File => LogDestination::File(self.file.clone()),
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both(self.file.clone()),
        }
    }

    pub fn level(&self) -> anyhow::Result<LevelFilter> {
        self.level
            .parse()
            .map_err(|_| anyhow!("invalid log level {:?}", self.level))
    }
}

impl AppConfig {
    /// Loads `path`, or the default file when `path` is `None`.
    ///
    /// A missing default file means built-in defaults; a missing explicit
    /// file is an error.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound && !explicit => {
                return Ok(Self::default());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("reading config {}", path.display()))
            }
        };
        let config = Self::parse(&text).with_context(|| format!("in {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let config: Self = ron::from_str(text).context("invalid config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.poll.interval_ms == 0 {
            bail!("poll.interval_ms must be greater than zero");
        }
        if self.history.degraded_capacity > self.history.capacity {
            bail!("history.degraded_capacity must not exceed history.capacity");
        }
        self.log.level()?;
        Ok(())
    }

    pub fn endpoints(&self) -> EndpointTable {
        let endpoints = |config: &EndpointConfig| Endpoints {
            submit: config.submit.clone(),
            status: config.status.clone(),
        };
        EndpointTable {
            idea: endpoints(&self.idea),
            script: endpoints(&self.script),
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            connect_timeout: Duration::from_millis(self.http.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.http.request_timeout_ms),
            max_download_bytes: self.http.max_download_bytes,
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                base_delay: Duration::from_millis(self.retry.base_delay_ms),
            },
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll.interval_ms),
            max_attempts: self.poll.max_attempts,
            max_consecutive_errors: self.poll.max_consecutive_errors,
        }
    }

    pub fn history_settings(&self) -> HistorySettings {
        HistorySettings {
            capacity: self.history.capacity,
            degraded_capacity: self.history.degraded_capacity,
        }
    }

    pub fn file_store(&self) -> FileStore {
        let store = FileStore::new(self.storage.dir.clone());
        match self.storage.quota_bytes {
            Some(quota) => store.with_quota(quota),
            None => store,
        }
    }
}
