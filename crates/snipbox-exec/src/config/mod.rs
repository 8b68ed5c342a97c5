mod env;

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::output::OutputEncoding;

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_stop_grace_ms() -> u64 {
    1_000
}

fn default_encoding() -> String {
    "UTF-8".into()
}

fn default_initial_capacity() -> usize {
    3_200
}

fn default_max_bytes() -> usize {
    65_536
}

fn default_blocked_packages() -> Vec<String> {
    vec!["java.nio".into()]
}

fn default_blocked_classes() -> Vec<String> {
    ["java.io.File", "java.lang.Runtime", "java.lang.Thread"]
        .map(String::from)
        .to_vec()
}

fn default_blocked_methods() -> Vec<String> {
    ["java.lang.System#exit", "java.lang.System#getenv"]
        .map(String::from)
        .to_vec()
}

/// Top-level evaluator configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub blocked: BlockedConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

/// Symbols untrusted code may not use. Each list accepts either a
/// comma-separated string or an array of strings. A list left out keeps
/// its default, which blocks host filesystem, process and thread access;
/// set it to `[]` to allow everything in that category.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockedConfig {
    #[serde(default = "default_blocked_packages", deserialize_with = "comma_list")]
    pub packages: Vec<String>,
    #[serde(default = "default_blocked_classes", deserialize_with = "comma_list")]
    pub classes: Vec<String>,
    /// `Class#method` pairs.
    #[serde(default = "default_blocked_methods", deserialize_with = "comma_list")]
    pub methods: Vec<String>,
}

impl BlockedConfig {
    /// Policy that blocks nothing.
    #[must_use]
    pub fn none() -> Self {
        Self {
            packages: Vec::new(),
            classes: Vec::new(),
            methods: Vec::new(),
        }
    }
}

impl Default for BlockedConfig {
    fn default() -> Self {
        Self {
            packages: default_blocked_packages(),
            classes: default_blocked_classes(),
            methods: default_blocked_methods(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// How long to wait for the engine to wind down after a forced stop.
    #[serde(default = "default_stop_grace_ms")]
    pub stop_grace_ms: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            stop_grace_ms: default_stop_grace_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_encoding")]
    pub encoding: String,
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,
    /// Hard cap on captured bytes per evaluation.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            encoding: default_encoding(),
            initial_capacity: default_initial_capacity(),
            max_bytes: default_max_bytes(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub destination: AuditDestination,
}

/// Where audit entries go. Written in TOML as `"stdout"` or a file path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum AuditDestination {
    /// The `audit` tracing target.
    #[default]
    Stdout,
    /// A file receiving one JSON object per line, appended to.
    File(PathBuf),
}

impl From<String> for AuditDestination {
    fn from(raw: String) -> Self {
        if raw.trim().eq_ignore_ascii_case("stdout") {
            Self::Stdout
        } else {
            Self::File(PathBuf::from(raw))
        }
    }
}

impl From<&str> for AuditDestination {
    fn from(raw: &str) -> Self {
        raw.to_owned().into()
    }
}

impl fmt::Display for AuditDestination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListForm {
    Joined(String),
    Items(Vec<String>),
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
        .collect()
}

fn comma_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ListForm::deserialize(deserializer)? {
        ListForm::Joined(raw) => split_list(&raw),
        ListForm::Items(items) => items
            .iter()
            .flat_map(|item| split_list(item))
            .collect(),
    })
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed, or
    /// if the resulting configuration is invalid.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            Self::read(path)?
        } else {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Like [`Config::load`], for a path the operator named explicitly: a
    /// missing file is an error instead of a silent fallback.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file does not exist or cannot be
    /// read, and any error [`Config::load`] returns.
    pub fn load_required(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::read(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str::<Self>(&content)?)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] for a zero deadline, an output cap smaller
    /// than the initial capacity, an unsupported encoding or a malformed
    /// blocked method entry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "execution.timeout_ms must be greater than zero".into(),
            ));
        }
        if self.output.max_bytes < self.output.initial_capacity {
            return Err(ConfigError::Invalid(format!(
                "output.max_bytes ({}) is smaller than output.initial_capacity ({})",
                self.output.max_bytes, self.output.initial_capacity
            )));
        }
        OutputEncoding::parse(&self.output.encoding)?;
        crate::filter::ExecutionFilter::from_config(&self.blocked)?;
        Ok(())
    }
}
