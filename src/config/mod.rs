//! # Configuration Management Module
//!
//! Typed, TOML-backed configuration for the harness and its bundled market
//! collaborator.
//!
//! ## Configuration Structure
//!
//! - [`HarnessConfig`] - Session player, command prefix characters, namespace tokens
//! - [`InventoryConfig`] - Capacities of the seven simulated containers
//! - [`AutosaveConfig`] - Autosave schedule and exit behavior
//! - [`MarketConfig`] - Data directory, starting funds, research cost, ware table
//! - [`LoggingConfig`] - Log level and optional log file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use tradebench::config::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     println!("Playing as: {}", config.harness.player_name);
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration File Format
//!
//! ```toml
//! [harness]
//! player_name = "John_Doe"
//! command_prefixes = ["/"]
//! namespaces = ["commandeconomy", "ce"]
//!
//! [inventory]
//! self_capacity = 36
//! neighbor_capacity = 27
//!
//! [autosave]
//! enabled = true
//! interval_secs = 300
//! save_on_exit = "prompt"
//!
//! [market]
//! data_dir = "./data"
//! research_cost = 250.0
//!
//! [[market.wares]]
//! id = "minecraft:planks"
//! alias = "wood"
//! price = 1.5
//! stock = 640
//! ```
//!
//! Every section may be omitted; missing values fall back to [`Config::default`].

use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub harness: HarnessConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
    #[serde(default)]
    pub autosave: AutosaveConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Name the local session plays as; it starts with operator rights.
    pub player_name: String,
    /// Single characters stripped from the front of a command (e.g. "/").
    pub command_prefixes: Vec<String>,
    /// Leading tokens dropped before lookup, e.g. `ce buy wood 1`.
    pub namespaces: Vec<String>,
    pub prompt: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            player_name: "John_Doe".to_string(),
            command_prefixes: vec!["/".to_string()],
            namespaces: vec!["commandeconomy".to_string(), "ce".to_string()],
            prompt: "> ".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    /// Distinct item ids the player's own inventory can hold
    pub self_capacity: usize,
    /// Distinct item ids each neighboring container can hold
    pub neighbor_capacity: usize,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            self_capacity: 36,
            neighbor_capacity: 27,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveOnExit {
    Prompt,
    Always,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub save_on_exit: SaveOnExit,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            save_on_exit: SaveOnExit::Prompt,
        }
    }
}

impl AutosaveConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WareConfig {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Where `wares.json` and `accounts.json` snapshots live
    pub data_dir: String,
    /// Balance given to accounts created on demand
    pub default_funds: f64,
    /// Presence enables the `research` command and its help block
    #[serde(skip_serializing_if = "Option::is_none")]
    pub research_cost: Option<f64>,
    pub wares: Vec<WareConfig>,
}

impl Default for MarketConfig {
    fn default() -> Self {
        let ware = |id: &str, alias: Option<&str>, price: f64, stock: i64| WareConfig {
            id: id.to_string(),
            alias: alias.map(str::to_string),
            price,
            stock,
        };
        Self {
            data_dir: "./data".to_string(),
            default_funds: 100.0,
            research_cost: None,
            wares: vec![
                ware("minecraft:planks", Some("wood"), 1.5, 640),
                ware("minecraft:cobblestone", Some("stone"), 0.5, 1280),
                ware("minecraft:iron_ingot", Some("iron"), 12.0, 128),
                ware("minecraft:apple", None, 3.0, 64),
            ],
        }
    }
}

impl MarketConfig {
    pub fn research_enabled(&self) -> bool {
        self.research_cost.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: Some("tradebench.log".to_string()),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub async fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;
        Self::parse(path, &content)
    }

    /// Blocking variant for the `reload config` command, which runs on the REPL task.
    pub fn load_blocking(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file {}: {}", path, e))?;
        Self::parse(path, &content)
    }

    fn parse(path: &str, content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| anyhow!("Failed to parse config file {}: {}", path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration file
    pub async fn create_default(path: &str) -> Result<()> {
        let config = Config::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| anyhow!("Failed to serialize default config: {}", e))?;

        fs::write(path, content)
            .await
            .map_err(|e| anyhow!("Failed to write config file {}: {}", path, e))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.harness.player_name.trim().is_empty() {
            return Err(anyhow!("harness.player_name must not be empty"));
        }
        for prefix in &self.harness.command_prefixes {
            let mut chars = prefix.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if !c.is_alphanumeric() && !c.is_whitespace() => {}
                _ => {
                    return Err(anyhow!(
                        "harness.command_prefixes entry '{}' must be a single symbol character",
                        prefix
                    ))
                }
            }
        }
        if self.inventory.self_capacity == 0 || self.inventory.neighbor_capacity == 0 {
            return Err(anyhow!("inventory capacities must be at least 1"));
        }
        if self.autosave.interval_secs == 0 {
            return Err(anyhow!("autosave.interval_secs must be at least 1"));
        }
        if let Some(cost) = self.market.research_cost {
            if !cost.is_finite() || cost < 0.0 {
                return Err(anyhow!("market.research_cost must be a non-negative number"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.harness.command_prefixes, vec!["/"]);
        assert_eq!(config.autosave.interval(), Duration::from_secs(300));
        assert!(!config.market.research_enabled());
    }

    #[test]
    fn test_sections_may_be_omitted() {
        let config: Config = toml::from_str(
            r#"
            [harness]
            player_name = "Tester"

            [market]
            research_cost = 42.0
            "#,
        )
        .unwrap();
        assert_eq!(config.harness.player_name, "Tester");
        assert_eq!(config.harness.namespaces, vec!["commandeconomy", "ce"]);
        assert_eq!(config.inventory.self_capacity, 36);
        assert_eq!(config.market.research_cost, Some(42.0));
        assert!(config.market.research_enabled());
        assert_eq!(config.autosave.save_on_exit, SaveOnExit::Prompt);
    }

    #[test]
    fn test_save_on_exit_parsing() {
        let config: Config = toml::from_str("[autosave]\nsave_on_exit = \"never\"\n").unwrap();
        assert_eq!(config.autosave.save_on_exit, SaveOnExit::Never);
        assert!(config.autosave.enabled);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = Config::default();
        config.harness.command_prefixes = vec!["ab".to_string()];
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.inventory.neighbor_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.autosave.interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.market.research_cost = Some(-1.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let serialized = toml::to_string_pretty(&Config::default()).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.market.wares, Config::default().market.wares);
        assert_eq!(parsed.logging.file.as_deref(), Some("tradebench.log"));
    }
}
