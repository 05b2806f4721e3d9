use crate::function::{DEFAULT_TIMEOUT, FunctionOptions};
use crate::provider::{AiProvider, ClaudeProvider, DEFAULT_MODEL, MockProvider};
use anyhow::{Result, anyhow};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub use_mock: bool,
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: u64,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            anthropic_api_key: None,
            model: default_model(),
            use_mock: false,
            default_timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load configuration from file, then let environment variables override it
    pub fn load() -> Result<Self> {
        let mut config = Self::load_or_default(&Self::get_config_path()?)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults when `path` does not exist; an unreadable or malformed file
    /// is an error.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("No config file found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(path).map_err(|e| {
            warn!("Failed to load config from {}: {}", path.display(), e);
            e.context(format!("Invalid config file: {}", path.display()))
        })
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!("Config file not found: {}", path.display()));
        }
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded config from: {}", path.display());
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(api_key) = std::env::var("ANTHROPIC_API_KEY") {
            self.anthropic_api_key = Some(api_key);
        }

        if std::env::var("NIXAI_USE_MOCK").is_ok() {
            self.use_mock = true;
        }

        if let Ok(timeout) = std::env::var("NIXAI_TIMEOUT_SECS") {
            match timeout.parse() {
                Ok(secs) => self.default_timeout_secs = secs,
                Err(_) => warn!("Ignoring invalid NIXAI_TIMEOUT_SECS value: {}", timeout),
            }
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::get_config_path()?)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        info!("Saved config to: {}", path.display());
        Ok(())
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    pub fn get_config_dir() -> Result<PathBuf> {
        let home = home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
        Ok(home.join(".nixai"))
    }

    /// Set API key and save config
    pub fn set_api_key(&mut self, api_key: String) -> Result<()> {
        self.anthropic_api_key = Some(api_key);
        self.save()?;
        info!("API key saved to config file");
        Ok(())
    }

    pub fn get_api_key(&self) -> Option<&String> {
        self.anthropic_api_key.as_ref()
    }

    pub fn is_mock_mode(&self) -> bool {
        self.use_mock
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_secs)
    }

    /// The configured AI provider: the mock in mock mode, Claude when an API
    /// key is available, nothing otherwise.
    pub fn provider(&self) -> Option<Arc<dyn AiProvider>> {
        if self.is_mock_mode() {
            info!("Using mock AI provider (NIXAI_USE_MOCK=1)");
            let provider: Arc<dyn AiProvider> = Arc::new(MockProvider::new());
            return Some(provider);
        }
        self.get_api_key().map(|key| {
            let provider: Arc<dyn AiProvider> = Arc::new(ClaudeProvider::new(key.clone(), self.model.clone()));
            provider
        })
    }

    /// Options for a CLI-initiated call.
    pub fn function_options(&self) -> FunctionOptions {
        let options = FunctionOptions::new().with_timeout(self.default_timeout());
        match self.provider() {
            Some(provider) => options.with_provider(provider),
            None => options,
        }
    }

    pub fn show_config_info() -> Result<()> {
        let config_path = Self::get_config_path()?;
        println!("Configuration file: {}", config_path.display());

        if config_path.exists() {
            println!("Status: Found");
            let config = Self::load_from_path(&config_path)?;
            println!("API Key: {}", if config.anthropic_api_key.is_some() { "Set" } else { "Not set" });
            println!("Model: {}", config.model);
            println!("Mock mode: {}", config.use_mock);
            println!("Default timeout: {}s", config.default_timeout_secs);
        } else {
            println!("Status: Not found (using defaults)");
        }

        println!("\nTo set API key:");
        println!("  nixai --set-api-key <your-key>");
        println!("\nOr set environment variable:");
        println!("  export ANTHROPIC_API_KEY=<your-key>");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.default_timeout(), Duration::from_secs(30));
        assert_eq!(config.model, DEFAULT_MODEL);
        assert!(!config.is_mock_mode());
        assert!(config.provider().is_none());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "use_mock = true\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert!(config.use_mock);
        assert_eq!(config.default_timeout_secs, 30);
        assert_eq!(config.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config {
            anthropic_api_key: Some("sk-test".into()),
            default_timeout_secs: 5,
            ..Config::default()
        };

        config.save_to_path(&path).unwrap();
        assert_eq!(Config::load_from_path(&path).unwrap(), config);
    }

    #[test]
    fn test_load_or_default_only_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert_eq!(Config::load_or_default(&missing).unwrap(), Config::default());

        let malformed = dir.path().join("config.toml");
        fs::write(&malformed, "use_mock = \"sometimes\"\n").unwrap();
        let err = Config::load_or_default(&malformed).unwrap_err();
        assert!(err.to_string().contains("Invalid config file"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load_from_path(&dir.path().join("absent.toml")).is_err());
    }

    #[test]
    fn test_function_options_carry_timeout_and_provider() {
        let config = Config {
            use_mock: true,
            default_timeout_secs: 7,
            ..Config::default()
        };
        let options = config.function_options();
        assert_eq!(options.timeout, Duration::from_secs(7));
        assert_eq!(options.provider.unwrap().name(), "mock");
    }

    #[test]
    fn test_api_key_selects_claude() {
        let config = Config {
            anthropic_api_key: Some("sk-test".into()),
            ..Config::default()
        };
        assert_eq!(config.provider().unwrap().name(), "claude");
    }
}
