use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

/// One configured data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(rename = "type")]
    pub type_tag: String,
    /// Instance name. Defaults to the type tag when missing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub settings: Value,
}

impl ProviderSettings {
    pub fn new(type_tag: &str, settings: Value) -> Self {
        Self {
            type_tag: type_tag.to_string(),
            name: None,
            settings,
        }
    }
}

/// `providers` may hold a single provider object or a list of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderList {
    One(ProviderSettings),
    Many(Vec<ProviderSettings>),
}

impl ProviderList {
    pub fn to_vec(&self) -> Vec<ProviderSettings> {
        match self {
            ProviderList::One(p) => vec![p.clone()],
            ProviderList::Many(list) => list.clone(),
        }
    }
}

impl Default for ProviderList {
    fn default() -> Self {
        ProviderList::One(ProviderSettings::new(
            "NetworkTables",
            serde_json::json!({ "address": "localhost" }),
        ))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct Settings {
    /// When enabled the application initialises the logger at debug level.
    /// Defaults to `false` when the field is missing in the settings file.
    #[serde(default)]
    pub debug_logging: bool,
    /// Write logs to this file instead of stdout.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default)]
    pub providers: ProviderList,
}

impl Settings {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &str) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn providers(&self) -> Vec<ProviderSettings> {
        self.providers.to_vec()
    }
}
