use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listen port.
    pub port: u16,
    /// Secret for the session cookie MAC. Must be at least 32 bytes.
    pub cookie_secret: String,
    #[serde(default = "default_cookie_ttl_days")]
    pub cookie_ttl_days: i64,
    /// Mesh dispatch endpoint (patterns are POSTed here as JSON).
    pub mesh_url: String,
    #[serde(default = "default_mesh_timeout_secs")]
    pub mesh_timeout_secs: u64,
    /// Upload service base URL (uploads forwarded to, orphans deleted from).
    pub fileserve_url: String,
    /// Public URL prefix used when linking uploaded assets in chat alerts.
    #[serde(default = "default_fileserve_public_base")]
    pub fileserve_public_base: String,
    /// Team chat webhook for informational posts. Unset disables them.
    #[serde(default)]
    pub slack_webhook_url: Option<String>,
    /// Team chat webhook for error posts. Unset disables them.
    #[serde(default)]
    pub slack_error_webhook_url: Option<String>,
    /// Place lookup service base URL. Unset disables geocoding; callers
    /// fall back to placeholder place names.
    #[serde(default)]
    pub geocoder_url: Option<String>,
    #[serde(default)]
    pub geocoder_key: Option<String>,
    /// Mount the development routes. Never enable in production.
    #[serde(default)]
    pub dev_routes: bool,
}

fn default_cookie_ttl_days() -> i64 {
    365
}

fn default_mesh_timeout_secs() -> u64 {
    30
}

fn default_fileserve_public_base() -> String {
    "https://locator-app.com".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            cookie_secret: String::new(),
            cookie_ttl_days: default_cookie_ttl_days(),
            mesh_url: "http://127.0.0.1:9000/act".to_string(),
            mesh_timeout_secs: default_mesh_timeout_secs(),
            fileserve_url: "http://127.0.0.1:3453".to_string(),
            fileserve_public_base: default_fileserve_public_base(),
            slack_webhook_url: None,
            slack_error_webhook_url: None,
            geocoder_url: None,
            geocoder_key: None,
            dev_routes: false,
        }
    }
}

impl Config {
    /// Load config from a YAML file. Returns None if the file does not exist.
    pub fn load_from_file(path: &Path) -> anyhow::Result<Option<Config>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(Some(config))
    }

    /// Write a default config file with documentation comments.
    /// Returns an error if the file already exists (to prevent accidental overwrite).
    pub fn write_default_config(path: &Path) -> anyhow::Result<()> {
        if path.exists() {
            anyhow::bail!(
                "config file already exists: {}. Remove it first to regenerate.",
                path.display()
            );
        }
        let template = include_str!("config_template.yaml");
        std::fs::write(path, template)
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the config for obvious errors.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.cookie_secret.len() < 32 {
            anyhow::bail!(
                "cookie_secret must be at least 32 bytes ({} given)",
                self.cookie_secret.len()
            );
        }
        if self.mesh_timeout_secs == 0 {
            anyhow::bail!("mesh_timeout_secs must be greater than 0");
        }
        for (name, url) in [
            ("mesh_url", Some(&self.mesh_url)),
            ("fileserve_url", Some(&self.fileserve_url)),
            ("slack_webhook_url", self.slack_webhook_url.as_ref()),
            ("slack_error_webhook_url", self.slack_error_webhook_url.as_ref()),
            ("geocoder_url", self.geocoder_url.as_ref()),
        ] {
            if let Some(url) = url {
                if !url.starts_with("http://") && !url.starts_with("https://") {
                    anyhow::bail!("{name} must start with http:// or https://: {url}");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            cookie_secret: "0123456789abcdef0123456789abcdef".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn validate_good_config() {
        assert!(valid().validate().is_ok());
    }

    #[test]
    fn validate_short_secret() {
        let config = Config {
            cookie_secret: "short".to_string(),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_bad_webhook_url() {
        let config = Config {
            slack_webhook_url: Some("not-a-url".to_string()),
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_zero_timeout() {
        let config = Config {
            mesh_timeout_secs: 0,
            ..valid()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_round_trip() {
        let config = Config {
            slack_webhook_url: Some("https://hooks.example.com/T1/B1".to_string()),
            geocoder_url: Some("https://places.example.com".to_string()),
            ..valid()
        };

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.port, 8000);
        assert_eq!(parsed.cookie_ttl_days, 365);
        assert_eq!(
            parsed.slack_webhook_url.as_deref(),
            Some("https://hooks.example.com/T1/B1")
        );
    }

    #[test]
    fn yaml_minimal_defaults() {
        let yaml = "port: 8000\ncookie_secret: 0123456789abcdef0123456789abcdef\nmesh_url: http://mesh:9000/act\nfileserve_url: http://files:3453\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.mesh_timeout_secs, 30);
        assert_eq!(config.cookie_ttl_days, 365);
        assert!(config.slack_webhook_url.is_none());
        assert!(!config.dev_routes);
    }
}
