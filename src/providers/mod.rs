//! Pluggable data-source providers.
//!
//! A provider bridges one external data source to the [`CanonicalTable`]
//! under a single contract: it pushes its values into the table through the
//! `update_source` callback and accepts dashboard-originated writes for the
//! keys it owns. Neither entry point may fail; transport problems surface
//! through [`SourceProvider::status`].
//!
//! [`CanonicalTable`]: crate::table::CanonicalTable

pub mod manager;
pub mod preview;
pub mod remote;

pub use manager::{ProviderFactory, ProviderHandle, SourceManager, StatusSink};
pub use preview::PreviewProvider;
pub use remote::{RemoteProvider, TelemetryClient, TransportError};

use crate::table::{TableEntry, TableValue, TypeTag};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

/// Callback a provider uses to push `(key, entry)` into the canonical table.
pub type UpdateSource = Rc<dyn Fn(&str, TableEntry)>;

/// Out-of-band health of a provider's backing transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderStatus {
    Connected,
    Disconnected { reason: String },
}

impl fmt::Display for ProviderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("connected"),
            Self::Disconnected { reason } => write!(f, "disconnected: {reason}"),
        }
    }
}

pub trait SourceProvider {
    /// Start the live feed. Must emit every currently known key once before
    /// returning, then keep emitting provider-side changes.
    fn update_from_provider(&mut self, update_source: UpdateSource);

    /// Accept a value the dashboard wants to push into this provider.
    fn update_from_dashboard(&mut self, key: &str, value: &Value);

    /// Give timer-driven providers a chance to emit pending changes.
    fn poll(&mut self) {}

    fn status(&self) -> ProviderStatus {
        ProviderStatus::Connected
    }
}

/// Provider-side storage shared by the built-in providers.
#[derive(Debug, Clone, Default)]
pub struct SourceStore {
    entries: BTreeMap<String, TableEntry>,
}

impl SourceStore {
    pub fn new(entries: BTreeMap<String, TableEntry>) -> Self {
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&TableEntry> {
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: &str, entry: TableEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TableEntry)> {
        self.entries.iter()
    }

    pub fn entries(&self) -> &BTreeMap<String, TableEntry> {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Apply a dashboard write.
    ///
    /// Unclassifiable values are dropped. A known key keeps its type: the value
    /// is replaced only when the tags match. An unknown key is created with its
    /// name defaulting to the key. Returns the stored entry when the write was
    /// applied.
    pub fn fold_dashboard_write(&mut self, key: &str, value: &Value) -> Option<&TableEntry> {
        let Some(table_value) = TableValue::from_json(value) else {
            tracing::debug!(key, "dashboard write with unknown value shape dropped");
            return None;
        };
        let type_tag = table_value.type_tag();
        match self.entries.get_mut(key) {
            Some(entry) if entry.type_tag == type_tag => entry.value = table_value,
            Some(entry) => {
                tracing::debug!(
                    key,
                    stored = %entry.type_tag,
                    incoming = %type_tag,
                    "dashboard write would change key type; dropped"
                );
                return None;
            }
            None => {
                self.entries
                    .insert(key.to_string(), TableEntry::new(key, table_value));
            }
        }
        self.entries.get(key)
    }

    /// Type currently stored for `key`.
    pub fn type_of(&self, key: &str) -> Option<TypeTag> {
        self.entries.get(key).map(|entry| entry.type_tag)
    }
}
