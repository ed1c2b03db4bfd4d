use anyhow::{Context, Result};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use pdprov_core::directory::http::DEFAULT_API_BASE_URL;
use pdprov_core::{EngineConfig, RestClientConfig, RunContext, SecretToken};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Prefix of environment variable overrides, e.g. `PDPROV_DIRECTORY__API_TOKEN`
pub const ENV_PREFIX: &str = "PDPROV_";

const MASKED: &str = "***";
const SECRET_KEYS: &[&str] = &["directory.api_token"];

#[derive(Deserialize, Serialize, Debug, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub import: ImportConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DirectoryConfig {
    pub api_base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,
    /// Sent as the `From` header on write requests
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requester_email: Option<String>,
    /// Shown in confirmation prompts
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    pub timeout_seconds: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ImportConfig {
    pub create_missing_teams: bool,
    pub confirm_before_run: bool,
    pub has_headers: bool,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub color_enabled: bool,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
            requester_email: None,
            account: None,
            timeout_seconds: 30,
        }
    }
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            create_missing_teams: true,
            confirm_before_run: true,
            has_headers: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            color_enabled: true,
        }
    }
}

impl AppConfig {
    /// Connection settings for the REST client
    ///
    /// A missing token is a configuration error.
    pub fn rest_client_config(&self) -> pdprov_core::Result<RestClientConfig> {
        let token = self
            .directory
            .api_token
            .as_deref()
            .map(SecretToken::new)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                pdprov_core::Error::configuration(format!(
                    "no API token configured; set directory.api_token or {ENV_PREFIX}DIRECTORY__API_TOKEN"
                ))
            })?;

        Ok(RestClientConfig::new(token)
            .with_base_url(self.directory.api_base_url.clone())
            .with_timeout(Duration::from_secs(self.directory.timeout_seconds)))
    }

    pub fn run_context(&self) -> RunContext {
        RunContext::new(
            self.directory.requester_email.clone(),
            self.directory.account.clone(),
        )
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            create_missing_teams: self.import.create_missing_teams,
            confirm_before_run: self.import.confirm_before_run,
        }
    }
}

/// Configuration manager that handles XDG-compliant paths and layered configuration
pub struct ConfigManager {
    config_path: PathBuf,
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigManager {
    /// Create a new ConfigManager with default XDG-compliant paths
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }

    /// Create a ConfigManager with a specific path (for testing)
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    pub fn get_config_path(&self) -> PathBuf {
        self.config_path.clone()
    }

    fn default_config_path() -> PathBuf {
        #[cfg(not(target_os = "windows"))]
        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
            && !xdg_config.is_empty()
        {
            return PathBuf::from(xdg_config).join("pdprov/config.toml");
        }

        #[cfg(target_os = "linux")]
        {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config/pdprov/config.toml")
        }

        #[cfg(not(target_os = "linux"))]
        {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("pdprov")
                .join("config.toml")
        }
    }

    /// Load configuration with layered priority: ENV > File > Defaults
    ///
    /// Command line flags are applied on top by the caller.
    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

        if self.config_path.exists() {
            figment = figment.merge(Toml::file(&self.config_path));
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        figment.extract().context("Failed to load configuration")
    }

    /// Get a configuration value by key (dot notation); secrets are masked
    pub fn get(&self, key: &str) -> Result<String> {
        let value = self.effective_values()?;

        let mut current = &value;
        for part in key.split('.') {
            match current {
                toml::Value::Table(table) => {
                    current = table
                        .get(part)
                        .ok_or_else(|| anyhow::anyhow!("Key '{}' is not set", key))?;
                }
                _ => anyhow::bail!("Invalid key path: {}", key),
            }
        }

        if SECRET_KEYS.contains(&key) {
            return Ok(MASKED.to_string());
        }

        scalar_to_string(current)
            .ok_or_else(|| anyhow::anyhow!("Value at '{}' is not a simple type", key))
    }

    /// Set a configuration value by key (dot notation) in the config file
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let parsed_value = parse_config_value(key, value)?;

        let mut config = if self.config_path.exists() {
            let content = fs::read_to_string(&self.config_path).with_context(|| {
                format!("Failed to read {}", self.config_path.display())
            })?;
            toml::from_str(&content)?
        } else {
            toml::Value::Table(toml::map::Map::new())
        };

        let Some((section, field)) = key.split_once('.') else {
            anyhow::bail!("Key must look like 'section.field': {}", key);
        };

        let toml::Value::Table(root) = &mut config else {
            anyhow::bail!("Config file is not a table");
        };
        if !root.contains_key(section) {
            root.insert(section.to_string(), toml::Value::Table(toml::map::Map::new()));
        }
        match root.get_mut(section) {
            Some(toml::Value::Table(table)) => {
                table.insert(field.to_string(), parsed_value);
            }
            _ => anyhow::bail!("Invalid key path: expected table at '{}'", section),
        }

        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let toml_string = toml::to_string_pretty(&config)?;
        fs::write(&self.config_path, toml_string)
            .with_context(|| format!("Failed to write {}", self.config_path.display()))?;

        Ok(())
    }

    /// List all effective configuration values, secrets masked
    pub fn list(&self) -> Result<Vec<(String, String)>> {
        let value = self.effective_values()?;

        let mut items = Vec::new();
        Self::collect_values(&value, String::new(), &mut items);
        for (key, value) in &mut items {
            if SECRET_KEYS.contains(&key.as_str()) {
                *value = MASKED.to_string();
            }
        }
        items.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(items)
    }

    fn effective_values(&self) -> Result<toml::Value> {
        let config = self.load()?;
        let toml_string = toml::to_string(&config)?;
        Ok(toml::from_str(&toml_string)?)
    }

    fn collect_values(value: &toml::Value, prefix: String, items: &mut Vec<(String, String)>) {
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    let new_prefix = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    Self::collect_values(val, new_prefix, items);
                }
            }
            other => {
                if let Some(text) = scalar_to_string(other) {
                    items.push((prefix, text));
                }
            }
        }
    }
}

fn scalar_to_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Validate a value for a known key and convert it to its TOML type
fn parse_config_value(key: &str, value: &str) -> Result<toml::Value> {
    match key {
        "directory.api_base_url" => {
            if !(value.starts_with("https://") || value.starts_with("http://")) {
                anyhow::bail!("api_base_url must start with http:// or https://");
            }
            Ok(toml::Value::String(value.trim_end_matches('/').to_string()))
        }
        "directory.api_token" | "directory.account" => {
            if value.trim().is_empty() {
                anyhow::bail!("{} must not be empty", key);
            }
            Ok(toml::Value::String(value.trim().to_string()))
        }
        "directory.requester_email" => {
            if !value.contains('@') {
                anyhow::bail!("requester_email must be an email address");
            }
            Ok(toml::Value::String(value.trim().to_string()))
        }
        "directory.timeout_seconds" => {
            let timeout: i64 = value
                .parse()
                .context("timeout_seconds must be a positive integer")?;
            if timeout <= 0 {
                anyhow::bail!("timeout_seconds must be greater than 0");
            }
            Ok(toml::Value::Integer(timeout))
        }
        "import.create_missing_teams"
        | "import.confirm_before_run"
        | "import.has_headers"
        | "output.color_enabled" => {
            let flag: bool = value.parse().context("Value must be 'true' or 'false'")?;
            Ok(toml::Value::Boolean(flag))
        }
        _ => anyhow::bail!("Unknown configuration key: {}", key),
    }
}

/// Load the configuration from the default location
pub fn get_config() -> Result<AppConfig> {
    ConfigManager::new().load()
}
