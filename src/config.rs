use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::duration::{deserialize_duration, serialize_duration};
use crate::models::{ExchangeAccount, WalletAccount};

/// Filter settings applied to every aggregation result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub hide_small_assets: bool,
    /// Holdings valued below this many USD are dropped when hiding is on.
    /// An unresolved price means `value_usd == 0`, so unpriced holdings are
    /// hidden by this filter as well; that is intended behavior.
    pub small_assets_threshold: f64,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            hide_small_assets: false,
            small_assets_threshold: 1.0,
        }
    }
}

/// TTLs for the cached aggregation snapshot and the auxiliary FX rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// How long a cached aggregation snapshot stays valid.
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub snapshot_ttl: Duration,

    /// Validity window for the USD exchange-rate snapshot. Shorter than the
    /// asset TTL; a stale rate is still served while a refresh runs in the
    /// background.
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub fx_ttl: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            snapshot_ttl: Duration::from_secs(10 * 60),
            fx_ttl: Duration::from_secs(60),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(rename = "exchange", skip_serializing_if = "Vec::is_empty")]
    pub exchanges: Vec<ExchangeAccount>,

    #[serde(rename = "wallet", skip_serializing_if = "Vec::is_empty")]
    pub wallets: Vec<WalletAccount>,

    pub filter: FilterSettings,

    pub cache: CacheSettings,

    /// Currency the UI layer displays totals in. Pricing is always USD;
    /// this only drives the auxiliary FX-rate lookup.
    pub display_currency: String,
}

impl AppConfig {
    /// Load from `path`, returning defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self {
                display_currency: "USD".to_string(),
                ..Self::default()
            });
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config at {}", path.display()))?;
        let mut config: Self =
            toml::from_str(&raw).with_context(|| format!("invalid config at {}", path.display()))?;
        if config.display_currency.is_empty() {
            config.display_currency = "USD".to_string();
        }
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, raw)
            .with_context(|| format!("failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Platform config file location, e.g. `~/.config/coinpanel/config.toml`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coinpanel")
            .join("config.toml")
    }

    /// Location of the cached aggregation snapshot.
    pub fn default_snapshot_path() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("coinpanel")
            .join("snapshot.json")
    }
}
