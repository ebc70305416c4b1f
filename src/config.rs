use crate::core::{Result, StorefrontError};
use crate::storage::StorageKeys;
use reqwest::Url;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Storefront client configuration
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// Base URL of the storefront API (routes are resolved below it)
    pub api_base_url: String,

    /// Upper bound for every single remote call
    pub request_timeout: Duration,

    /// Directory holding the persisted cart, session id and auth token
    pub data_dir: PathBuf,

    /// Prefix for all storage keys
    pub storage_prefix: String,

    /// Ask for a billing address before checkout when signed in
    pub require_address: bool,

    pub user_agent: String,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}

impl StorefrontConfig {
    pub fn new(api_base_url: &str) -> Self {
        Self {
            api_base_url: api_base_url.to_string(),
            request_timeout: Duration::from_secs(10),
            data_dir: PathBuf::from(".storefront"),
            storage_prefix: "storefront".to_string(),
            require_address: false,
            user_agent: concat!("storefront_cart/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }

    /// Set the per-call timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the data directory
    pub fn data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the storage key prefix
    pub fn storage_prefix(mut self, prefix: &str) -> Self {
        self.storage_prefix = prefix.to_string();
        self
    }

    pub fn require_address(mut self, required: bool) -> Self {
        self.require_address = required;
        self
    }

    pub fn user_agent(mut self, user_agent: &str) -> Self {
        self.user_agent = user_agent.to_string();
        self
    }

    pub fn storage_keys(&self) -> StorageKeys {
        StorageKeys::with_prefix(&self.storage_prefix)
    }

    /// Load from the process environment (and a `.env` file if present)
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from an arbitrary variable source
    ///
    /// Recognised variables: `STOREFRONT_API_URL`, `STOREFRONT_TIMEOUT_SECS`,
    /// `STOREFRONT_DATA_DIR`, `STOREFRONT_STORAGE_PREFIX`,
    /// `STOREFRONT_REQUIRE_ADDRESS`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("STOREFRONT_API_URL") {
            Some(url) => Self::new(&url),
            None => Self::default(),
        };

        if let Some(raw) = lookup("STOREFRONT_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|_| {
                StorefrontError::Config("STOREFRONT_TIMEOUT_SECS must be a whole number of seconds".to_string())
            })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(dir) = lookup("STOREFRONT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }

        if let Some(prefix) = lookup("STOREFRONT_STORAGE_PREFIX") {
            config.storage_prefix = prefix;
        }

        if let Some(raw) = lookup("STOREFRONT_REQUIRE_ADDRESS") {
            config.require_address = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(StorefrontError::Config(
                        "STOREFRONT_REQUIRE_ADDRESS must be a boolean".to_string(),
                    ));
                }
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.api_base_url).map_err(|e| {
            StorefrontError::Config(format!("Invalid API base URL '{}': {}", self.api_base_url, e))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(StorefrontError::Config(format!(
                "API base URL must be http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(StorefrontError::Config("request_timeout must be greater than 0".to_string()));
        }

        if self.storage_prefix.is_empty()
            || !self
                .storage_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(StorefrontError::Config(format!(
                "storage_prefix '{}' must be non-empty and contain only letters, digits, '_' or '-'",
                self.storage_prefix
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = StorefrontConfig::default();
        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_pattern() {
        let config = StorefrontConfig::new("https://shop.example")
            .request_timeout(Duration::from_secs(3))
            .storage_prefix("shop")
            .require_address(true);

        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.storage_keys().cart, "shop_cart");
        assert!(config.require_address);
    }

    #[test]
    fn test_from_lookup() {
        let config = StorefrontConfig::from_lookup(lookup(&[
            ("STOREFRONT_API_URL", "https://api.shop.example"),
            ("STOREFRONT_TIMEOUT_SECS", "4"),
            ("STOREFRONT_DATA_DIR", "/tmp/cart"),
            ("STOREFRONT_REQUIRE_ADDRESS", "yes"),
        ]))
        .unwrap();

        assert_eq!(config.api_base_url, "https://api.shop.example");
        assert_eq!(config.request_timeout, Duration::from_secs(4));
        assert_eq!(config.data_dir, PathBuf::from("/tmp/cart"));
        assert!(config.require_address);
    }

    #[test]
    fn test_invalid_values() {
        assert!(StorefrontConfig::from_lookup(lookup(&[("STOREFRONT_TIMEOUT_SECS", "soon")])).is_err());
        assert!(StorefrontConfig::from_lookup(lookup(&[("STOREFRONT_TIMEOUT_SECS", "0")])).is_err());
        assert!(StorefrontConfig::from_lookup(lookup(&[("STOREFRONT_API_URL", "ftp://x")])).is_err());
        assert!(StorefrontConfig::from_lookup(lookup(&[("STOREFRONT_STORAGE_PREFIX", "a/b")])).is_err());
    }
}
