pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Direct path to a configuration file
pub const CONFIG_PATH_ENV: &str = "POOLFLOW_CONFIG_PATH";
/// API token, takes precedence over the file
pub const TOKEN_ENV: &str = "POOLFLOW_API_TOKEN";
pub const CLIENT_ID_ENV: &str = "POOLFLOW_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "POOLFLOW_CLIENT_SECRET";

const CONFIG_FILE: &str = "poolflow.yaml";
const DEFAULT_REGION: &str = "us-east-2";

/// Upper bounds for asynchronous waits, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub create: u64,
    pub update: u64,
    pub delete: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            create: 15 * 60,
            update: 15 * 60,
            delete: 5 * 60,
        }
    }
}

/// Poll loop cadence, in seconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    pub delay: u64,
    pub interval: u64,
    pub min_timeout: u64,
    pub settle_count: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            delay: 2,
            interval: 5,
            min_timeout: 3,
            settle_count: 1,
        }
    }
}

/// Poolflow client configuration
///
/// Every field has a default, so an empty file (or no file at all) yields a
/// usable configuration once credentials come from the environment.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolflowConfig {
    pub region: String,

    /// GraphQL endpoint; derived from `region` when unset
    pub api_url: Option<String>,

    /// OAuth2 token endpoint; derived from `region` when unset
    pub auth_url: Option<String>,

    pub token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,

    pub timeouts: TimeoutConfig,
    pub polling: PollingConfig,

    /// Per-request HTTP timeout, in seconds
    pub request_timeout: u64,
}

impl Default for PoolflowConfig {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            api_url: None,
            auth_url: None,
            token: None,
            client_id: None,
            client_secret: None,
            timeouts: TimeoutConfig::default(),
            polling: PollingConfig::default(),
            request_timeout: 30,
        }
    }
}

impl std::fmt::Debug for PoolflowConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redacted = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("PoolflowConfig")
            .field("region", &self.region)
            .field("api_url", &self.api_url())
            .field("auth_url", &self.auth_url())
            .field("token", &redacted(&self.token))
            .field("client_id", &self.client_id)
            .field("client_secret", &redacted(&self.client_secret))
            .field("timeouts", &self.timeouts)
            .field("polling", &self.polling)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl PoolflowConfig {
    /// Find, parse and validate the configuration, then apply environment
    /// overrides
    pub fn load() -> Result<Self> {
        let mut config = match find_config_file()? {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration");
                Self::from_file(&path)?
            }
            None => {
                tracing::debug!("no configuration file found, using defaults");
                Self::default()
            }
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Parse YAML content; `path` is only used in error messages
    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override credentials from `POOLFLOW_API_TOKEN`, `POOLFLOW_CLIENT_ID`
    /// and `POOLFLOW_CLIENT_SECRET`
    pub fn apply_env(&mut self) {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        if let Some(token) = non_empty(TOKEN_ENV) {
            self.token = Some(token);
        }
        if let Some(id) = non_empty(CLIENT_ID_ENV) {
            self.client_id = Some(id);
        }
        if let Some(secret) = non_empty(CLIENT_SECRET_ENV) {
            self.client_secret = Some(secret);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.region.trim().is_empty() {
            return Err(ConfigError::Invalid("region must not be empty".to_string()));
        }
        for (name, url) in [("api_url", self.api_url()), ("auth_url", self.auth_url())] {
            if !url.starts_with("https://") && !url.starts_with("http://") {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be an http(s) URL: {url}"
                )));
            }
        }
        if self.polling.settle_count == 0 {
            return Err(ConfigError::Invalid(
                "polling.settle_count must be at least 1".to_string(),
            ));
        }
        if self.client_id.is_some() != self.client_secret.is_some() {
            return Err(ConfigError::Invalid(
                "client_id and client_secret must be set together".to_string(),
            ));
        }
        Ok(())
    }

    pub fn api_url(&self) -> String {
        self.api_url
            .clone()
            .unwrap_or_else(|| format!("https://api.{}.propeldata.com/graphql", self.region))
    }

    pub fn auth_url(&self) -> String {
        self.auth_url
            .clone()
            .unwrap_or_else(|| format!("https://auth.{}.propeldata.com/oauth2/token", self.region))
    }

    /// Whether a token or client credentials are available
    pub fn has_credentials(&self) -> bool {
        self.token.is_some() || (self.client_id.is_some() && self.client_secret.is_some())
    }

    pub fn create_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.create)
    }

    pub fn update_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.update)
    }

    pub fn delete_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.delete)
    }

    pub fn poll_delay(&self) -> Duration {
        Duration::from_secs(self.polling.delay)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.polling.interval)
    }

    pub fn min_poll_timeout(&self) -> Duration {
        Duration::from_secs(self.polling.min_timeout)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

/// Global configuration directory (`~/.config/poolflow`)
pub fn config_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("poolflow"))
}

/// Locate the configuration file
///
/// Search order:
/// 1. `POOLFLOW_CONFIG_PATH` (direct path)
/// 2. `./poolflow.yaml`
/// 3. `./.poolflow/poolflow.yaml`
/// 4. `~/.config/poolflow/poolflow.yaml`
pub fn find_config_file() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        tracing::warn!(path = %path.display(), "{CONFIG_PATH_ENV} points to a missing file");
    }

    let current_dir = std::env::current_dir()?;
    let candidates = [
        current_dir.join(CONFIG_FILE),
        current_dir.join(".poolflow").join(CONFIG_FILE),
    ];
    if let Some(path) = candidates.into_iter().find(|p| p.exists()) {
        return Ok(Some(path));
    }

    if let Ok(dir) = config_dir() {
        let global = dir.join(CONFIG_FILE);
        if global.exists() {
            return Ok(Some(global));
        }
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    fn clear_env() {
        unsafe {
            std::env::remove_var(CONFIG_PATH_ENV);
            std::env::remove_var(TOKEN_ENV);
            std::env::remove_var(CLIENT_ID_ENV);
            std::env::remove_var(CLIENT_SECRET_ENV);
        }
    }

    #[test]
    fn test_defaults() {
        let config = PoolflowConfig::default();
        assert_eq!(config.api_url(), "https://api.us-east-2.propeldata.com/graphql");
        assert_eq!(
            config.auth_url(),
            "https://auth.us-east-2.propeldata.com/oauth2/token"
        );
        assert_eq!(config.create_timeout(), Duration::from_secs(900));
        assert_eq!(config.delete_timeout(), Duration::from_secs(300));
        assert!(!config.has_credentials());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_file() {
        let yaml = r#"
region: eu-west-1
token: secret-token
timeouts:
  create: 60
polling:
  settle_count: 2
"#;
        let config = PoolflowConfig::parse(yaml, Path::new("poolflow.yaml")).unwrap();

        assert_eq!(config.api_url(), "https://api.eu-west-1.propeldata.com/graphql");
        assert_eq!(config.create_timeout(), Duration::from_secs(60));
        assert_eq!(config.update_timeout(), Duration::from_secs(900));
        assert_eq!(config.polling.settle_count, 2);
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert!(config.has_credentials());
    }

    #[test]
    fn test_explicit_urls_win() {
        let yaml = "api_url: http://localhost:4000/graphql\n";
        let config = PoolflowConfig::parse(yaml, Path::new("poolflow.yaml")).unwrap();
        assert_eq!(config.api_url(), "http://localhost:4000/graphql");
    }

    #[test]
    fn test_parse_error_names_file() {
        let err = PoolflowConfig::parse("timeouts: [1, 2]", Path::new("bad.yaml")).unwrap_err();
        assert!(err.to_string().starts_with("failed to parse bad.yaml"));
    }

    #[test]
    fn test_validate() {
        let config = PoolflowConfig {
            polling: PollingConfig {
                settle_count: 0,
                ..PollingConfig::default()
            },
            ..PoolflowConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = PoolflowConfig {
            client_id: Some("id".to_string()),
            ..PoolflowConfig::default()
        };
        assert!(config.validate().is_err());

        let config = PoolflowConfig {
            api_url: Some("ftp://example.com".to_string()),
            ..PoolflowConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = PoolflowConfig {
            token: Some("super-secret".to_string()),
            ..PoolflowConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn test_token_env_override() {
        clear_env();
        unsafe {
            std::env::set_var(TOKEN_ENV, "from-env");
        }

        let mut config = PoolflowConfig {
            token: Some("from-file".to_string()),
            ..PoolflowConfig::default()
        };
        config.apply_env();
        assert_eq!(config.token.as_deref(), Some("from-env"));

        clear_env();
    }

    #[test]
    #[serial]
    fn test_find_config_in_current_dir() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        fs::write(temp_dir.path().join("poolflow.yaml"), "region: us-west-2\n").unwrap();
        fs::create_dir(temp_dir.path().join(".poolflow")).unwrap();
        fs::write(
            temp_dir.path().join(".poolflow").join("poolflow.yaml"),
            "region: eu-west-1\n",
        )
        .unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        // The top-level file wins over .poolflow/
        let found = find_config_file().unwrap().unwrap();
        assert!(found.ends_with("poolflow.yaml"));
        assert!(!found.to_string_lossy().contains(".poolflow/"));

        let config = PoolflowConfig::load().unwrap();
        assert_eq!(config.region, "us-west-2");

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_find_config_in_poolflow_dir() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();

        let dir = temp_dir.path().join(".poolflow");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join("poolflow.yaml"), "region: eu-west-1\n").unwrap();

        std::env::set_current_dir(&temp_dir).unwrap();

        let found = find_config_file().unwrap().unwrap();
        assert!(found.ends_with(".poolflow/poolflow.yaml"));

        std::env::set_current_dir(original_dir).unwrap();
    }

    #[test]
    #[serial]
    fn test_find_config_env_var() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        let config_path = temp_dir.path().join("custom.yaml");
        fs::write(&config_path, "region: ap-south-1\n").unwrap();

        unsafe {
            std::env::set_var(CONFIG_PATH_ENV, config_path.to_str().unwrap());
        }

        assert_eq!(find_config_file().unwrap(), Some(config_path));
        assert_eq!(PoolflowConfig::load().unwrap().region, "ap-south-1");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_load_without_file_uses_defaults() {
        clear_env();
        let temp_dir = tempfile::tempdir().unwrap();
        let original_dir = std::env::current_dir().unwrap();
        std::env::set_current_dir(&temp_dir).unwrap();

        let found = find_config_file().unwrap();
        // A global file on the test machine may still be found
        if found.is_none() {
            assert_eq!(PoolflowConfig::load().unwrap(), PoolflowConfig::default());
        }

        std::env::set_current_dir(original_dir).unwrap();
    }
}
