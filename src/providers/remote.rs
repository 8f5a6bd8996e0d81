use super::{ProviderStatus, SourceProvider, SourceStore, UpdateSource};
use crate::table::{TableEntry, TableValue, TypeTag};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("not connected to {0}")]
    Disconnected(String),
    #[error("write to '{key}' rejected: {reason}")]
    Rejected { key: String, reason: String },
    #[error("transport io error: {0}")]
    Io(String),
}

/// Read/write/type-query contract of the remote telemetry service. The wire
/// protocol lives behind implementations of this trait.
pub trait TelemetryClient {
    fn connect(&mut self) -> Result<(), TransportError>;
    /// Every key the remote currently holds.
    fn snapshot(&mut self) -> Result<Vec<(String, TableEntry)>, TransportError>;
    /// Keys that changed since the previous call.
    fn drain_changes(&mut self) -> Result<Vec<(String, TableEntry)>, TransportError>;
    fn write(&mut self, key: &str, value: &TableValue) -> Result<(), TransportError>;
    /// Type the remote reports for `key`, if it knows the key.
    fn value_type(&self, key: &str) -> Option<TypeTag>;
}

/// Provider backed by a live robot telemetry connection.
///
/// Dashboard writes are folded into the local cache and forwarded to the
/// network; the table sees them once the remote echoes the change.
pub struct RemoteProvider {
    client: Box<dyn TelemetryClient>,
    cache: SourceStore,
    update_source: Option<UpdateSource>,
    status: ProviderStatus,
}

impl RemoteProvider {
    pub fn new(client: Box<dyn TelemetryClient>) -> Self {
        Self {
            client,
            cache: SourceStore::default(),
            update_source: None,
            status: ProviderStatus::Disconnected {
                reason: "not started".to_string(),
            },
        }
    }

    pub fn cached(&self, key: &str) -> Option<&TableEntry> {
        self.cache.get(key)
    }

    fn fail(&mut self, err: TransportError) {
        tracing::warn!(error = %err, "telemetry transport failure");
        self.status = ProviderStatus::Disconnected {
            reason: err.to_string(),
        };
    }

    fn emit(&mut self, changes: Vec<(String, TableEntry)>) {
        for (key, entry) in changes {
            self.cache.insert(&key, entry.clone());
            if let Some(update) = &self.update_source {
                update(&key, entry);
            }
        }
    }

    fn fetch_snapshot(&mut self) -> Option<Vec<(String, TableEntry)>> {
        let result = self
            .client
            .connect()
            .and_then(|_| self.client.snapshot());
        match result {
            Ok(snapshot) => {
                tracing::info!(entries = snapshot.len(), "telemetry connected");
                self.status = ProviderStatus::Connected;
                Some(snapshot)
            }
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    fn connect_and_snapshot(&mut self) {
        if let Some(snapshot) = self.fetch_snapshot() {
            self.emit(snapshot);
        }
    }
}

impl SourceProvider for RemoteProvider {
    fn update_from_provider(&mut self, update_source: UpdateSource) {
        self.update_source = Some(update_source);
        // Remote values win over cached ones; each key is announced once.
        let mut merged: BTreeMap<String, TableEntry> = self
            .cache
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();
        if let Some(snapshot) = self.fetch_snapshot() {
            merged.extend(snapshot);
        }
        self.emit(merged.into_iter().collect());
    }

    fn update_from_dashboard(&mut self, key: &str, value: &Value) {
        if self.cache.get(key).is_none() {
            if let Some(remote_type) = self.client.value_type(key) {
                let incoming = TypeTag::classify(value);
                if incoming.is_some() && incoming != Some(remote_type) {
                    tracing::debug!(key, remote = %remote_type, "dashboard write would change remote key type; dropped");
                    return;
                }
            }
        }
        let Some(entry) = self.cache.fold_dashboard_write(key, value).cloned() else {
            return;
        };
        if let Err(err) = self.client.write(key, &entry.value) {
            self.fail(err);
        }
    }

    fn poll(&mut self) {
        if self.update_source.is_none() {
            return;
        }
        if self.status != ProviderStatus::Connected {
            self.connect_and_snapshot();
            return;
        }
        match self.client.drain_changes() {
            Ok(changes) => self.emit(changes),
            Err(err) => self.fail(err),
        }
    }

    fn status(&self) -> ProviderStatus {
        self.status.clone()
    }
}
