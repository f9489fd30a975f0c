//! Interlock configuration

use std::path::PathBuf;
use std::time::Duration;

use sober_biometric::{MatchPolicy, DEFAULT_CAPTURE_TIMEOUT, DEFAULT_SIMILARITY_THRESHOLD};
use sober_core::DEFAULT_BLOCK_WINDOW;
use sober_policy::PolicyConfig;
use sober_time::SchedulerConfig;
use sober_transport::{LinkEndpoint, DEFAULT_BAUD_RATE, DEFAULT_LINE_QUEUE};

use crate::{LogFormat, RuntimeError, RuntimeResult};

pub const ENV_LINK: &str = "SOBER_LINK";
pub const ENV_REGISTRY: &str = "SOBER_REGISTRY";
pub const ENV_SPOOL_DIR: &str = "SOBER_SPOOL_DIR";
pub const ENV_OUTBOX_DIR: &str = "SOBER_OUTBOX_DIR";
pub const ENV_LOCATION_FILE: &str = "SOBER_LOCATION_FILE";
pub const ENV_POLL_INTERVAL: &str = "SOBER_POLL_INTERVAL";
pub const ENV_CAPTURE_TIMEOUT: &str = "SOBER_CAPTURE_TIMEOUT";
pub const ENV_BLOCK_WINDOW: &str = "SOBER_BLOCK_WINDOW";
pub const ENV_ERROR_BACKOFF: &str = "SOBER_ERROR_BACKOFF";
pub const ENV_SIMILARITY_THRESHOLD: &str = "SOBER_SIMILARITY_THRESHOLD";
pub const ENV_LOG_FORMAT: &str = "SOBER_LOG_FORMAT";
pub const ENV_LINE_QUEUE: &str = "SOBER_LINE_QUEUE";
pub const ENV_BAUD_RATE: &str = "SOBER_BAUD_RATE";

/// Interlock configuration
#[derive(Clone, Debug)]
pub struct InterlockConfig {
    /// Sensor link
    pub link: LinkEndpoint,
    /// Serial line speed, ignored for TCP bridges
    pub baud_rate: u32,
    /// Registry record file
    pub registry_path: PathBuf,
    /// Directory shared with the capture helper
    pub spool_dir: PathBuf,
    /// Alert outbox; alerts are only logged when unset
    pub outbox_dir: Option<PathBuf>,
    /// ipinfo JSON kept fresh by an external helper
    pub location_file: Option<PathBuf>,
    pub poll_interval: Duration,
    pub capture_timeout: Duration,
    pub block_window: Duration,
    pub error_backoff: Duration,
    pub similarity_threshold: f64,
    pub log_format: LogFormat,
    /// Inbound line queue depth
    pub line_queue: usize,
}

impl Default for InterlockConfig {
    fn default() -> Self {
        InterlockConfig {
            link: LinkEndpoint::default(),
            baud_rate: DEFAULT_BAUD_RATE,
            registry_path: PathBuf::from("state/registry.json"),
            spool_dir: PathBuf::from("spool"),
            outbox_dir: None,
            location_file: None,
            poll_interval: Duration::from_millis(100),
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
            block_window: DEFAULT_BLOCK_WINDOW,
            error_backoff: Duration::from_secs(1),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            log_format: LogFormat::default(),
            line_queue: DEFAULT_LINE_QUEUE,
        }
    }
}

impl InterlockConfig {
    /// Defaults overlaid with `SOBER_*` environment variables
    pub fn from_env() -> RuntimeResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overlaid with whatever `lookup` returns for each `SOBER_*` key
    pub fn from_lookup<F>(lookup: F) -> RuntimeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = InterlockConfig::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(link) = get(ENV_LINK) {
            config.link = LinkEndpoint::parse(&link)?;
        }
        if let Some(path) = get(ENV_REGISTRY) {
            config.registry_path = PathBuf::from(path);
        }
        if let Some(dir) = get(ENV_SPOOL_DIR) {
            config.spool_dir = PathBuf::from(dir);
        }
        if let Some(dir) = get(ENV_OUTBOX_DIR) {
            config.outbox_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = get(ENV_LOCATION_FILE) {
            config.location_file = Some(PathBuf::from(path));
        }
        if let Some(v) = get(ENV_POLL_INTERVAL) {
            config.poll_interval = parse_duration(ENV_POLL_INTERVAL, &v)?;
        }
        if let Some(v) = get(ENV_CAPTURE_TIMEOUT) {
            config.capture_timeout = parse_duration(ENV_CAPTURE_TIMEOUT, &v)?;
        }
        if let Some(v) = get(ENV_BLOCK_WINDOW) {
            config.block_window = parse_duration(ENV_BLOCK_WINDOW, &v)?;
        }
        if let Some(v) = get(ENV_ERROR_BACKOFF) {
            config.error_backoff = parse_duration(ENV_ERROR_BACKOFF, &v)?;
        }
        if let Some(v) = get(ENV_SIMILARITY_THRESHOLD) {
            config.similarity_threshold = v.trim().parse().map_err(|_| {
                RuntimeError::Config(format!("{ENV_SIMILARITY_THRESHOLD}: not a number: {v}"))
            })?;
        }
        if let Some(v) = get(ENV_LOG_FORMAT) {
            config.log_format = v.parse()?;
        }
        if let Some(v) = get(ENV_BAUD_RATE) {
            config.baud_rate = v.trim().parse().map_err(|_| {
                RuntimeError::Config(format!("{ENV_BAUD_RATE}: not a baud rate: {v}"))
            })?;
        }
        if let Some(v) = get(ENV_LINE_QUEUE) {
            config.line_queue = v.trim().parse().map_err(|_| {
                RuntimeError::Config(format!("{ENV_LINE_QUEUE}: not a count: {v}"))
            })?;
        }

        Ok(config)
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        if self.poll_interval.is_zero() {
            return Err(RuntimeError::Config("poll interval must be positive".into()));
        }
        if self.block_window.is_zero() {
            return Err(RuntimeError::Config("block window must be positive".into()));
        }
        if !(self.similarity_threshold > 0.0 && self.similarity_threshold <= 1.0) {
            return Err(RuntimeError::Config(format!(
                "similarity threshold must be in (0, 1], got {}",
                self.similarity_threshold
            )));
        }
        if self.line_queue == 0 {
            return Err(RuntimeError::Config("line queue must hold at least one line".into()));
        }
        Ok(())
    }

    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            block_window: self.block_window,
            capture_timeout: self.capture_timeout,
            match_policy: MatchPolicy::new(self.similarity_threshold),
            ..PolicyConfig::default()
        }
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: self.poll_interval,
            error_backoff: self.error_backoff,
        }
    }
}

fn parse_duration(key: &str, value: &str) -> RuntimeResult<Duration> {
    humantime::parse_duration(value.trim())
        .map_err(|e| RuntimeError::Config(format!("{key}: {e}")))
}
