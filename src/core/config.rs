use crate::core::holding::HoldingRef;
use crate::core::quote::AssetType;
use crate::core::refresh::{DEFAULT_CONCURRENCY, DEFAULT_GROUP_TIMEOUT};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

pub const USERNAME_ENV: &str = "ALTINKAYNAK_USERNAME";
pub const PASSWORD_ENV: &str = "ALTINKAYNAK_PASSWORD";

/// Execution mode. Certificate validation may only be relaxed outside production.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Development,
    #[default]
    Production,
}

impl Mode {
    pub fn is_production(&self) -> bool {
        matches!(self, Mode::Production)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct TefasProviderConfig {
    pub base_url: String,
}

impl Default for TefasProviderConfig {
    fn default() -> Self {
        TefasProviderConfig {
            base_url: "https://www.tefas.gov.tr".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct IsYatirimProviderConfig {
    pub base_url: String,
}

impl Default for IsYatirimProviderConfig {
    fn default() -> Self {
        IsYatirimProviderConfig {
            base_url: "https://www.isyatirim.com.tr".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct AltinkaynakProviderConfig {
    #[serde(default = "default_altinkaynak_url")]
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

fn default_altinkaynak_url() -> String {
    "http://data.altinkaynak.com".to_string()
}

impl Default for AltinkaynakProviderConfig {
    fn default() -> Self {
        AltinkaynakProviderConfig {
            base_url: default_altinkaynak_url(),
            username: None,
            password: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct TcmbProviderConfig {
    pub base_url: String,
}

impl Default for TcmbProviderConfig {
    fn default() -> Self {
        TcmbProviderConfig {
            base_url: "https://www.tcmb.gov.tr".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ProvidersConfig {
    pub tefas: TefasProviderConfig,
    pub isyatirim: IsYatirimProviderConfig,
    pub altinkaynak: AltinkaynakProviderConfig,
    pub tcmb: TcmbProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RefreshConfig {
    pub concurrency: usize,
    pub group_timeout_secs: u64,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        RefreshConfig {
            concurrency: DEFAULT_CONCURRENCY,
            group_timeout_secs: DEFAULT_GROUP_TIMEOUT.as_secs(),
        }
    }
}

impl RefreshConfig {
    pub fn group_timeout(&self) -> Duration {
        Duration::from_secs(self.group_timeout_secs)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct HoldingConfig {
    #[serde(rename = "type")]
    pub asset_type: AssetType,
    pub code: String,
    pub quantity: Decimal,
    /// Display name; filled from the first successful quote when absent.
    pub name: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub holdings: Vec<HoldingConfig>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("tr", "quotekeeper", "quotekeeper")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Replaces metal service credentials with values found through `lookup`.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let altinkaynak = &mut self.providers.altinkaynak;
        if let Some(username) = lookup(USERNAME_ENV).filter(|v| !v.trim().is_empty()) {
            debug!("Metal service username taken from environment");
            altinkaynak.username = Some(username);
        }
        if let Some(password) = lookup(PASSWORD_ENV).filter(|v| !v.trim().is_empty()) {
            debug!("Metal service password taken from environment");
            altinkaynak.password = Some(password);
        }
        self
    }

    /// Holdings as storage references, numbered from 1 in file order.
    pub fn holding_refs(&self) -> Vec<HoldingRef> {
        self.holdings
            .iter()
            .zip(1..)
            .map(|(holding, id)| HoldingRef {
                id,
                asset_type: holding.asset_type,
                code: holding.code.trim().to_uppercase(),
                quantity: holding.quantity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
mode: development
providers:
  tefas:
    base_url: "http://localhost:1234"
  altinkaynak:
    username: "user"
    password: "secret"
refresh:
  concurrency: 2
holdings:
  - type: fund
    code: aft
    quantity: 120.5
  - type: hisse
    code: THYAO
    quantity: 10
    name: "Türk Hava Yolları"
  - type: altin
    code: GA
    quantity: "2.25"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.mode, Mode::Development);
        assert_eq!(config.providers.tefas.base_url, "http://localhost:1234");
        assert_eq!(
            config.providers.isyatirim.base_url,
            "https://www.isyatirim.com.tr"
        );
        assert_eq!(
            config.providers.altinkaynak.base_url,
            "http://data.altinkaynak.com"
        );
        assert_eq!(config.providers.altinkaynak.username.as_deref(), Some("user"));
        assert_eq!(config.refresh.concurrency, 2);
        assert_eq!(config.refresh.group_timeout(), DEFAULT_GROUP_TIMEOUT);

        assert_eq!(config.holdings.len(), 3);
        assert_eq!(config.holdings[1].asset_type, AssetType::Equity);
        assert_eq!(config.holdings[1].name.as_deref(), Some("Türk Hava Yolları"));
        assert_eq!(config.holdings[2].asset_type, AssetType::Metal);
        assert_eq!(
            config.holdings[2].quantity,
            Decimal::from_str("2.25").unwrap()
        );

        let refs = config.holding_refs();
        assert_eq!(refs[0].id, 1);
        assert_eq!(refs[0].code, "AFT");
        assert_eq!(refs[0].quantity, Decimal::from_str("120.5").unwrap());
        assert_eq!(refs[2].id, 3);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, AppConfig::default());
        assert!(config.mode.is_production());
        assert_eq!(config.refresh.concurrency, DEFAULT_CONCURRENCY);
        assert!(config.providers.altinkaynak.username.is_none());
        assert!(config.holdings.is_empty());
    }

    #[test]
    fn test_unknown_asset_type_is_rejected() {
        let yaml_str = "holdings:\n  - { type: bond, code: X, quantity: 1 }\n";
        assert!(serde_yaml::from_str::<AppConfig>(yaml_str).is_err());
    }

    #[test]
    fn test_environment_overrides_credentials() {
        let config = AppConfig::default().with_env_overrides(|key| match key {
            USERNAME_ENV => Some("env-user".to_string()),
            PASSWORD_ENV => Some("env-pass".to_string()),
            _ => None,
        });
        assert_eq!(
            config.providers.altinkaynak.username.as_deref(),
            Some("env-user")
        );
        assert_eq!(
            config.providers.altinkaynak.password.as_deref(),
            Some("env-pass")
        );

        let mut file_config = AppConfig::default();
        file_config.providers.altinkaynak.username = Some("file-user".to_string());
        let config = file_config.with_env_overrides(|key| match key {
            USERNAME_ENV => Some("  ".to_string()),
            _ => None,
        });
        assert_eq!(
            config.providers.altinkaynak.username.as_deref(),
            Some("file-user")
        );
    }
}
