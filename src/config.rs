use crate::grouping::GroupRules;
use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Remote inventory service endpoint, e.g. "https://inventory.example.com/api".
    pub base_url: String,

    pub api_key: String,

    /// Known avatar id, if persisted from an earlier session.
    #[serde(default)]
    pub avatar_id: Option<String>,

    /// Applied by the remote-service client, not by the sync layer.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Source tag stamped on pickups that don't carry one, e.g. "Quake".
    #[serde(default = "default_source")]
    pub default_source: String,

    /// Per-title stack/unlock and tab tables.
    #[serde(default)]
    pub rules: GroupRules,
}

fn default_timeout() -> u64 {
    30
}

fn default_source() -> String {
    "local".to_string()
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::from_filename(".env");
        let cfg = Self {
            base_url: std::env::var("LOOTLINK_BASE_URL")
                .unwrap_or_else(|_| "https://inventory.example.com/api".to_string()),
            api_key: std::env::var("LOOTLINK_API_KEY").unwrap_or_default(),
            avatar_id: std::env::var("LOOTLINK_AVATAR_ID").ok(),
            timeout_seconds: std::env::var("LOOTLINK_TIMEOUT_SECONDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_timeout),
            default_source: std::env::var("LOOTLINK_DEFAULT_SOURCE").unwrap_or_else(|_| default_source()),
            rules: GroupRules::default(),
        };

        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GroupMode;

    #[test]
    fn t_load_full_rules_table() {
        let toml_src = r#"
            base_url = "https://inventory.example.com/api"
            api_key = "k-123"
            default_source = "Quake"

            [[rules.groups]]
            label = "Shells"
            mode = "sum"
            value = "delta"

            [[rules.groups]]
            label = "Green Armor"
            mode = "sum"
            value = "quantity"

            [[rules.tabs]]
            name = "Ammo"
            types = ["ammo"]
            names = ["Shells", "Nails"]

            [[rules.tabs]]
            name = "Items"
            fallback = true
        "#;
        let cfg: Config = toml::from_str(toml_src).unwrap();
        assert_eq!(cfg.timeout_seconds, 30);
        assert_eq!(cfg.rules.groups.len(), 2);
        assert_eq!(cfg.rules.groups[0].mode, GroupMode::Sum);
        assert!(cfg.rules.stacks("Shells"));
        assert!(!cfg.rules.stacks("Silver Key"));
        assert!(cfg.rules.tab("Items").unwrap().fallback);
    }

    #[test]
    fn t_rules_default_to_empty() {
        let cfg: Config = toml::from_str(
            r#"
            base_url = "https://inventory.example.com/api"
            api_key = ""
        "#,
        )
        .unwrap();
        assert!(cfg.rules.groups.is_empty());
        assert_eq!(cfg.default_source, "local");
    }
}
