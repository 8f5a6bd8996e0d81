use super::{SourceProvider, SourceStore, UpdateSource};
use crate::table::TableEntry;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
struct PreviewSettings {
    #[serde(default)]
    sources: BTreeMap<String, TableEntry>,
}

/// Simulated provider for designing dashboards without a live connection.
///
/// Every write into its store, including dashboard writes, is forwarded to the
/// table once the feed is running, which closes the dashboard -> provider ->
/// table loop.
#[derive(Default)]
pub struct PreviewProvider {
    sources: SourceStore,
    update_source: Option<UpdateSource>,
}

impl PreviewProvider {
    pub fn new(sources: BTreeMap<String, TableEntry>) -> Self {
        let sources = sources
            .into_iter()
            .map(|(key, mut entry)| {
                if entry.name.is_empty() {
                    entry.name = key.clone();
                }
                (key, entry)
            })
            .collect();
        Self {
            sources: SourceStore::new(sources),
            update_source: None,
        }
    }

    /// Build from `{"sources": {"/key": {"value": .., "type": .., "name": ..}}}`.
    pub fn from_settings(settings: &Value) -> anyhow::Result<Self> {
        let parsed: PreviewSettings = if settings.is_null() {
            PreviewSettings::default()
        } else {
            serde_json::from_value(settings.clone())?
        };
        Ok(Self::new(parsed.sources))
    }

    /// Store an entry and forward it to the table.
    pub fn set_source(&mut self, key: &str, entry: TableEntry) {
        self.sources.insert(key, entry.clone());
        if let Some(update) = &self.update_source {
            update(key, entry);
        }
    }

    pub fn sources(&self) -> &BTreeMap<String, TableEntry> {
        self.sources.entries()
    }
}

impl SourceProvider for PreviewProvider {
    fn update_from_provider(&mut self, update_source: UpdateSource) {
        self.update_source = Some(update_source.clone());
        let snapshot: Vec<(String, TableEntry)> = self
            .sources
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();
        tracing::debug!(entries = snapshot.len(), "preview provider emitting snapshot");
        for (key, entry) in snapshot {
            update_source(&key, entry);
        }
    }

    fn update_from_dashboard(&mut self, key: &str, value: &Value) {
        let Some(entry) = self.sources.fold_dashboard_write(key, value).cloned() else {
            return;
        };
        if let Some(update) = &self.update_source {
            update(key, entry);
        }
    }
}
