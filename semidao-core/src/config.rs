//! Configuration management
//!
//! Settings live in `settings.json` inside the data directory:
//! ```json
//! {
//!   "portal": { "baseUrl": "...", "sessionWarmup": "soft", "requestTimeoutSecs": 30 },
//!   "linking": { "minDateDelta": 4, "maxDateDelta": 25, "amountDelta": 0.1 },
//!   "documentsDir": "/path/to/documents"
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ports::LinkConfig;

/// Default portal root; endpoint paths are appended to it
pub const DEFAULT_BASE_URL: &str = "http://agence-en-ligne.semidao.fr/wp/";

/// Environment variable overriding the portal base URL
pub const BASE_URL_ENV: &str = "SEMIDAO_BASE_URL";

/// What to do when the initial session-establishing GET fails at the transport level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionWarmup {
    /// Log the failure and carry on to the login POST
    #[default]
    Soft,
    /// Abort the run with LOGIN_FAILED
    Strict,
}

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    portal: PortalSettings,
    #[serde(default)]
    linking: LinkingSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    documents_dir: Option<PathBuf>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalSettings {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub session_warmup: SessionWarmup,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for PortalSettings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            session_warmup: SessionWarmup::default(),
            request_timeout_secs: default_timeout_secs(),
            user_agent: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkingSettings {
    #[serde(default = "default_min_date_delta")]
    pub min_date_delta: i64,
    #[serde(default = "default_max_date_delta")]
    pub max_date_delta: i64,
    #[serde(default = "default_amount_delta")]
    pub amount_delta: Decimal,
}

fn default_min_date_delta() -> i64 {
    4
}

fn default_max_date_delta() -> i64 {
    25
}

fn default_amount_delta() -> Decimal {
    Decimal::new(1, 1)
}

impl Default for LinkingSettings {
    fn default() -> Self {
        Self {
            min_date_delta: default_min_date_delta(),
            max_date_delta: default_max_date_delta(),
            amount_delta: default_amount_delta(),
        }
    }
}

/// Connector configuration (resolved view of settings)
#[derive(Debug, Clone)]
pub struct Config {
    pub portal: PortalSettings,
    pub linking: LinkingSettings,
    pub documents_dir: PathBuf,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Config {
    /// Load config from the data directory
    ///
    /// The base URL can be overridden with `SEMIDAO_BASE_URL` (for testing
    /// against a staging portal).
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join("settings.json");

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content)?
        } else {
            SettingsFile::default()
        };

        let mut portal = raw.portal.clone();
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            if !url.trim().is_empty() {
                portal.base_url = url;
            }
        }

        let documents_dir = raw
            .documents_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("documents"));

        Ok(Self {
            portal,
            linking: raw.linking.clone(),
            documents_dir,
            _raw_settings: raw,
        })
    }

    /// Save config to the data directory
    /// Preserves other settings that the connector doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join("settings.json");

        let mut settings = self._raw_settings.clone();
        settings.portal = self.portal.clone();
        // An env override is not a setting
        if std::env::var(BASE_URL_ENV).ok().as_deref() == Some(self.portal.base_url.as_str()) {
            settings.portal.base_url = self._raw_settings.portal.base_url.clone();
        }
        settings.linking = self.linking.clone();
        if self.documents_dir != data_dir.join("documents") {
            settings.documents_dir = Some(self.documents_dir.clone());
        }

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }

    /// Change one setting by its CLI key
    ///
    /// Keys: `base-url`, `session-warmup`, `timeout`, `user-agent`,
    /// `documents-dir`, `min-date-delta`, `max-date-delta`, `amount-delta`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            "base-url" => {
                if value.is_empty() {
                    anyhow::bail!("base-url cannot be empty");
                }
                self.portal.base_url = value.to_string();
            }
            "session-warmup" => {
                self.portal.session_warmup = value.parse().map_err(anyhow::Error::msg)?;
            }
            "timeout" => {
                self.portal.request_timeout_secs = value
                    .parse()
                    .with_context(|| format!("invalid timeout: {}", value))?;
            }
            "user-agent" => {
                self.portal.user_agent = (!value.is_empty()).then(|| value.to_string());
            }
            "documents-dir" => self.documents_dir = PathBuf::from(value),
            "min-date-delta" => {
                self.linking.min_date_delta = value
                    .parse()
                    .with_context(|| format!("invalid min-date-delta: {}", value))?;
            }
            "max-date-delta" => {
                self.linking.max_date_delta = value
                    .parse()
                    .with_context(|| format!("invalid max-date-delta: {}", value))?;
            }
            "amount-delta" => {
                self.linking.amount_delta = Decimal::from_str(value)
                    .with_context(|| format!("invalid amount-delta: {}", value))?;
            }
            other => anyhow::bail!("unknown setting: {}", other),
        }
        Ok(())
    }

    /// Linking window for the given vendor
    pub fn link_config(&self, vendor: &str) -> LinkConfig {
        LinkConfig {
            vendor: vendor.to_string(),
            min_date_delta: self.linking.min_date_delta,
            max_date_delta: self.linking.max_date_delta,
            amount_delta: self.linking.amount_delta,
        }
    }

    /// Config for a data directory with every setting at its default
    pub fn with_defaults(data_dir: &Path) -> Self {
        Self {
            portal: PortalSettings::default(),
            linking: LinkingSettings::default(),
            documents_dir: data_dir.join("documents"),
            _raw_settings: SettingsFile::default(),
        }
    }
}

impl FromStr for SessionWarmup {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "soft" => Ok(SessionWarmup::Soft),
            "strict" => Ok(SessionWarmup::Strict),
            other => Err(format!("unknown session warm-up policy: {}", other)),
        }
    }
}
