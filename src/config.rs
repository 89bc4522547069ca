use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use homedir::my_home;
use serde::{Deserialize, Serialize};

use crate::engine::{FailurePolicy, FanOut};

const CONFIG_FILE: &str = "config.yaml";

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-pro";
/// Env var holding the api key; the key itself never lands in config.yaml
const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_CONCURRENCY: usize = 8;

const DEFAULT_LISTEN: &str = "0.0.0.0:8080";
const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 120;

/// Configuration for the external classifier and batch fan-out
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Base url of the generateContent API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name (e.g., "gemini-pro")
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the environment variable holding the api key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Timeout for a single model request in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Maximum number of model requests in flight per batch
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// all_or_nothing or skip_failed
    #[serde(default)]
    pub failure_policy: FailurePolicy,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            failure_policy: FailurePolicy::default(),
        }
    }
}

impl ClassifierConfig {
    pub fn fan_out(&self) -> FanOut {
        FanOut::new(self.max_concurrency, self.failure_policy)
    }
}

/// Configuration for `msim daemon`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Upper bound for a whole duplicates/related/tags operation in seconds
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_api_key_env() -> String {
    DEFAULT_API_KEY_ENV.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_max_concurrency() -> usize {
    DEFAULT_MAX_CONCURRENCY
}

fn default_listen() -> String {
    DEFAULT_LISTEN.to_string()
}

fn default_operation_timeout_secs() -> u64 {
    DEFAULT_OPERATION_TIMEOUT_SECS
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(skip_serializing, skip_deserializing)]
    base_path: PathBuf,
}

impl Config {
    fn validate(&self) -> anyhow::Result<()> {
        let classifier = &self.classifier;

        if let Err(err) = url::Url::parse(&classifier.endpoint) {
            bail!(
                "classifier.endpoint must be an absolute url, got '{}': {err}",
                classifier.endpoint
            );
        }

        if classifier.model.trim().is_empty() {
            bail!("classifier.model must not be empty");
        }

        if classifier.api_key_env.trim().is_empty() {
            bail!("classifier.api_key_env must not be empty");
        }

        if classifier.request_timeout_secs == 0 {
            bail!("classifier.request_timeout_secs must be greater than 0");
        }

        if classifier.max_concurrency == 0 {
            bail!("classifier.max_concurrency must be greater than 0");
        }

        if self.server.operation_timeout_secs == 0 {
            bail!("server.operation_timeout_secs must be greater than 0");
        }

        Ok(())
    }

    /// Base directory from `MSIM_BASE_PATH`, or `~/.local/share/msim`.
    pub fn base_path() -> anyhow::Result<PathBuf> {
        if let Ok(path) = std::env::var("MSIM_BASE_PATH") {
            return Ok(PathBuf::from(path));
        }

        let home = my_home()
            .context("could not determine home directory")?
            .context("home directory path is empty")?;
        Ok(home.join(".local/share/msim"))
    }

    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(&Self::base_path()?)
    }

    pub fn load_with(base_path: &Path) -> anyhow::Result<Self> {
        let path = base_path.join(CONFIG_FILE);

        // create new if does not exist
        if !path.exists() {
            std::fs::create_dir_all(base_path)
                .with_context(|| format!("failed to create {}", base_path.display()))?;
            std::fs::write(&path, serde_yml::to_string(&Self::default())?)
                .with_context(|| format!("failed to write {}", path.display()))?;
            log::info!("created default config at {}", path.display());
        }

        let config_str = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let mut config: Self = serde_yml::from_str(&config_str)
            .with_context(|| format!("{} is malformed", path.display()))?;

        config.base_path = base_path.to_path_buf();

        config.validate()?;

        // resave in case config version needs an upgrade
        if config_str != serde_yml::to_string(&config)? {
            config.save()?;
        }

        Ok(config)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = self.base_path.join(CONFIG_FILE);
        std::fs::write(&path, serde_yml::to_string(&self)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }
}
