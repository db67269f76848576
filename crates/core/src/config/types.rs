use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub sample: SampleConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_port() -> u16 {
    8080
}

/// Ingestion engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Maximum number of rows processed concurrently across all uploads.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// Upper bound on a single ingestion run in seconds (0 = no limit).
    #[serde(default = "default_max_duration")]
    pub max_duration_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
            max_duration_secs: default_max_duration(),
        }
    }
}

impl IngestConfig {
    /// Sets the worker pool size.
    pub fn with_max_workers(mut self, max: usize) -> Self {
        self.max_workers = max;
        self
    }

    /// Sets the run duration limit in seconds.
    pub fn with_max_duration_secs(mut self, secs: u64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    /// The run duration limit, if one is configured.
    pub fn max_duration(&self) -> Option<Duration> {
        (self.max_duration_secs > 0).then(|| Duration::from_secs(self.max_duration_secs))
    }
}

fn default_max_workers() -> usize {
    4
}

fn default_max_duration() -> u64 {
    600 // 10 minutes
}

/// Upload handling configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    /// Directory uploaded files are stored in before ingestion.
    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,

    /// Largest accepted upload in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,

    /// Accepted file extension, without the leading dot.
    #[serde(default = "default_allowed_extension")]
    pub allowed_extension: String,

    /// Respond only after every row has been processed.
    #[serde(default = "default_wait")]
    pub wait_for_completion: bool,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            max_file_size: default_max_file_size(),
            allowed_extension: default_allowed_extension(),
            wait_for_completion: default_wait(),
        }
    }
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("public/uploads")
}

fn default_max_file_size() -> usize {
    1024 * 2024
}

fn default_allowed_extension() -> String {
    "csv".to_string()
}

fn default_wait() -> bool {
    true
}

/// Synthetic test data generated at start-up
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SampleConfig {
    #[serde(default = "default_sample_enabled")]
    pub enabled: bool,
    #[serde(default = "default_sample_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_sample_file_name")]
    pub file_name: String,
    #[serde(default = "default_sample_accounts")]
    pub accounts: usize,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            enabled: default_sample_enabled(),
            dir: default_sample_dir(),
            file_name: default_sample_file_name(),
            accounts: default_sample_accounts(),
        }
    }
}

impl SampleConfig {
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }
}

fn default_sample_enabled() -> bool {
    true
}

fn default_sample_dir() -> PathBuf {
    PathBuf::from("public")
}

fn default_sample_file_name() -> String {
    "test_accounts.csv".to_string()
}

fn default_sample_accounts() -> usize {
    40_000
}

/// Config as exposed over the API
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub ingest: IngestConfig,
    pub upload: UploadConfig,
    pub sample: SampleConfig,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            ingest: config.ingest.clone(),
            upload: config.upload.clone(),
            sample: config.sample.clone(),
        }
    }
}
