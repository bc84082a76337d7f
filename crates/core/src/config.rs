//! YAML configuration model.
//!
//! Loaded once at startup from the file named by `--config`. Section and
//! field names are part of the deployment surface and match the fleet's
//! existing configuration files.

use std::path::Path;

use serde::Deserialize;

use crate::peer::{PeerAddr, PeerAddrError};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    Load(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub http_server: HttpServerConfig,
    pub http_client: HttpClientConfig,
    pub storage: StorageConfig,
    pub face_recognizers: FaceRecognizersConfig,
    pub control_panels: ControlPanelsConfig,
    #[serde(default)]
    pub logger: LoggerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpServerConfig {
    pub addr: String,
    pub port: u16,
    #[serde(default = "default_server_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_server_timeout_ms")]
    pub write_timeout_ms: u64,
    /// TLS key path; with `crt_path` selects the advertised https scheme.
    #[serde(default)]
    pub key_path: String,
    #[serde(default)]
    pub crt_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpClientConfig {
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub addr: String,
    pub port: u16,
    pub user: String,
    pub passwd: String,
    pub default_db: String,
    #[serde(default = "default_max_pings")]
    pub max_pings: u32,
    #[serde(default = "default_storage_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_storage_timeout_ms")]
    pub write_timeout_ms: u64,
    /// Directory where raw image files are archived.
    pub img_path: String,
    #[serde(default)]
    pub debug: bool,
    /// Upper bound on sin²θ for a nearest-neighbour match. The historical
    /// key name survives; the computed quantity is 1 − cos²θ.
    pub cosine_boundary: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FaceRecognizersConfig {
    pub face_recognizers: Vec<String>,
    pub aw_imgs_q_max_size: usize,
    pub aw_imgs_q_clean_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlPanelsConfig {
    #[serde(default)]
    pub control_panels: Vec<String>,
    pub aco_q_max_size: usize,
    pub aco_q_clean_ms: u64,
    pub ac_q_max_size: usize,
    pub ac_q_clean_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggerConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_true")]
    pub ansi: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            ansi: true,
        }
    }
}

fn default_server_timeout_ms() -> u64 {
    10_000
}

fn default_storage_timeout_ms() -> u64 {
    5_000
}

fn default_max_pings() -> u32 {
    3
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load and validate a configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let mut config: Config = serde_yaml::from_reader(file)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// The coordinator's own advertised base URL, echoed in every header.
    /// https iff both TLS paths are configured.
    pub fn source_addr(&self) -> String {
        let scheme = if self.http_server.key_path.is_empty() || self.http_server.crt_path.is_empty()
        {
            "http"
        } else {
            "https"
        };
        format!(
            "{scheme}://{}:{}",
            self.http_server.addr, self.http_server.port
        )
    }

    fn normalize(&mut self) {
        while self.storage.img_path.ends_with('/') {
            self.storage.img_path.pop();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.storage.cosine_boundary <= 0.0 || self.storage.cosine_boundary > 1.0 {
            return Err(ConfigError::Invalid(format!(
                "storage.cosine_boundary must be in (0, 1], got {}",
                self.storage.cosine_boundary
            )));
        }
        if self.storage.img_path.is_empty() {
            return Err(ConfigError::Invalid(
                "storage.img_path must not be empty".to_string(),
            ));
        }
        let parse_all = |urls: &[String], section: &str| -> Result<(), ConfigError> {
            urls.iter().try_for_each(|url| {
                PeerAddr::parse(url).map(|_| ()).map_err(|e: PeerAddrError| {
                    ConfigError::Invalid(format!("{section}: {e}"))
                })
            })
        };
        parse_all(
            &self.face_recognizers.face_recognizers,
            "face_recognizers.face_recognizers",
        )?;
        parse_all(&self.control_panels.control_panels, "control_panels.control_panels")?;
        Ok(())
    }
}
