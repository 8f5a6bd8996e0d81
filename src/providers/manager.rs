use super::{PreviewProvider, ProviderStatus, SourceProvider, UpdateSource};
use crate::settings::ProviderSettings;
use crate::table::{CanonicalTable, TableEntry};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::rc::{Rc, Weak};

/// Builds a provider instance from its settings object.
pub type ProviderFactory = Rc<dyn Fn(&Value) -> anyhow::Result<Box<dyn SourceProvider>>>;

/// Receives `(provider name, new status)` whenever a provider's status changes.
pub type StatusSink = Rc<dyn Fn(&str, &ProviderStatus)>;

pub const PREVIEW_TYPE: &str = "Preview";

struct HandleInner {
    name: String,
    type_tag: String,
    provider: RefCell<Box<dyn SourceProvider>>,
    queued: RefCell<VecDeque<(String, Value)>>,
    last_status: RefCell<ProviderStatus>,
}

/// A registered provider instance.
///
/// Calls into a provider can re-enter it: a dashboard write echoed into the
/// table may trigger a widget that writes again. Such writes are queued while
/// the provider is busy and drained in order once the outer call returns.
#[derive(Clone)]
pub struct ProviderHandle {
    inner: Rc<HandleInner>,
}

impl ProviderHandle {
    fn new(name: &str, type_tag: &str, provider: Box<dyn SourceProvider>) -> Self {
        let status = provider.status();
        Self {
            inner: Rc::new(HandleInner {
                name: name.to_string(),
                type_tag: type_tag.to_string(),
                provider: RefCell::new(provider),
                queued: RefCell::new(VecDeque::new()),
                last_status: RefCell::new(status),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn type_tag(&self) -> &str {
        &self.inner.type_tag
    }

    pub fn status(&self) -> ProviderStatus {
        self.inner.last_status.borrow().clone()
    }

    /// Run `f` against the provider. Returns `None` while the provider is
    /// already in use further up the stack.
    pub fn with<R>(&self, f: impl FnOnce(&mut dyn SourceProvider) -> R) -> Option<R> {
        let mut provider = self.inner.provider.try_borrow_mut().ok()?;
        Some(f(provider.as_mut()))
    }

    fn write(&self, key: &str, value: &Value) {
        self.inner
            .queued
            .borrow_mut()
            .push_back((key.to_string(), value.clone()));
        if self.inner.provider.try_borrow_mut().is_err() {
            tracing::trace!(provider = %self.inner.name, key, "provider busy; write queued");
            return;
        }
        self.drain();
    }

    fn drain(&self) {
        loop {
            let next = self.inner.queued.borrow_mut().pop_front();
            let Some((key, value)) = next else {
                break;
            };
            let applied = self.with(|p| p.update_from_dashboard(&key, &value));
            if applied.is_none() {
                self.inner.queued.borrow_mut().push_front((key, value));
                break;
            }
        }
    }

    /// Record the provider's current status, returning it when it changed.
    fn refresh_status(&self) -> Option<ProviderStatus> {
        let current = self.with(|p| p.status())?;
        let mut last = self.inner.last_status.borrow_mut();
        if *last == current {
            return None;
        }
        *last = current.clone();
        Some(current)
    }
}

struct ManagerInner {
    table: CanonicalTable,
    factories: RefCell<BTreeMap<String, ProviderFactory>>,
    providers: RefCell<Vec<ProviderHandle>>,
    status_sinks: RefCell<Vec<StatusSink>>,
}

/// Owns the provider registry and routes dashboard writes to the provider
/// owning each key.
#[derive(Clone)]
pub struct SourceManager {
    inner: Rc<ManagerInner>,
}

impl SourceManager {
    /// Create an empty manager and install its write sink on `table`.
    pub fn new(table: CanonicalTable) -> Self {
        let inner = Rc::new(ManagerInner {
            table: table.clone(),
            factories: RefCell::new(BTreeMap::new()),
            providers: RefCell::new(Vec::new()),
            status_sinks: RefCell::new(Vec::new()),
        });
        let weak: Weak<ManagerInner> = Rc::downgrade(&inner);
        table.set_write_sink(Rc::new(move |key: &str, value: &Value| {
            if let Some(inner) = weak.upgrade() {
                SourceManager { inner }.route(key, value);
            }
        }));
        Self { inner }
    }

    /// Manager with the built-in `Preview` provider type registered.
    pub fn with_defaults(table: CanonicalTable) -> Self {
        let manager = Self::new(table);
        manager.add_type(
            PREVIEW_TYPE,
            Rc::new(|settings: &Value| {
                let provider: Box<dyn SourceProvider> =
                    Box::new(PreviewProvider::from_settings(settings)?);
                Ok(provider)
            }),
        );
        manager
    }

    pub fn table(&self) -> &CanonicalTable {
        &self.inner.table
    }

    pub fn add_type(&self, type_tag: &str, factory: ProviderFactory) {
        self.inner
            .factories
            .borrow_mut()
            .insert(type_tag.to_string(), factory);
    }

    pub fn has_type(&self, type_tag: &str) -> bool {
        self.inner.factories.borrow().contains_key(type_tag)
    }

    /// Instantiate a provider of `type_tag`, register it under `name` (the
    /// type tag when omitted) and start its feed into the table. A provider
    /// already registered under the same name is replaced.
    pub fn add_provider(
        &self,
        type_tag: &str,
        name: Option<&str>,
        settings: &Value,
    ) -> Option<ProviderHandle> {
        let factory = self.inner.factories.borrow().get(type_tag).cloned();
        let Some(factory) = factory else {
            tracing::warn!(type_tag, "unknown provider type");
            return None;
        };
        let provider = match factory(settings) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(type_tag, error = %e, "failed to create provider");
                return None;
            }
        };
        let name = name.unwrap_or(type_tag);
        self.register(name, type_tag, provider)
    }

    /// Register an already constructed provider and start its feed.
    pub fn register(
        &self,
        name: &str,
        type_tag: &str,
        provider: Box<dyn SourceProvider>,
    ) -> Option<ProviderHandle> {
        let handle = ProviderHandle::new(name, type_tag, provider);
        {
            let mut providers = self.inner.providers.borrow_mut();
            if let Some(slot) = providers.iter_mut().find(|h| h.name() == name) {
                tracing::info!(provider = name, "replacing provider");
                *slot = handle.clone();
            } else {
                providers.push(handle.clone());
            }
        }
        tracing::info!(provider = name, type_tag, "provider registered");
        let table = self.inner.table.clone();
        let owner = name.to_string();
        let update: UpdateSource = Rc::new(move |key: &str, entry: TableEntry| {
            table.set(&owner, key, entry);
        });
        handle.with(|p| p.update_from_provider(update));
        handle.drain();
        self.report(&handle);
        Some(handle)
    }

    /// Add every provider listed in the settings. Returns how many started.
    pub fn add_from_settings(&self, providers: &[ProviderSettings]) -> usize {
        providers
            .iter()
            .filter(|p| {
                self.add_provider(&p.type_tag, p.name.as_deref(), &p.settings)
                    .is_some()
            })
            .count()
    }

    pub fn provider(&self, name: &str) -> Option<ProviderHandle> {
        self.inner
            .providers
            .borrow()
            .iter()
            .find(|h| h.name() == name)
            .cloned()
    }

    pub fn providers(&self) -> Vec<ProviderHandle> {
        self.inner.providers.borrow().clone()
    }

    /// Forward a dashboard write to the provider owning `key`, falling back to
    /// the first registered provider for keys nobody owns yet.
    pub fn route(&self, key: &str, value: &Value) {
        let owner = self.inner.table.owner(key);
        let target = {
            let providers = self.inner.providers.borrow();
            owner
                .as_deref()
                .and_then(|o| providers.iter().find(|h| h.name() == o))
                .or_else(|| providers.first())
                .cloned()
        };
        match target {
            Some(handle) => {
                handle.write(key, value);
                self.report(&handle);
            }
            None => tracing::debug!(key, "no provider registered; dashboard write dropped"),
        }
    }

    /// Let every provider emit pending changes.
    pub fn poll(&self) {
        for handle in self.providers() {
            handle.with(|p| p.poll());
            handle.drain();
            self.report(&handle);
        }
    }

    pub fn on_status(&self, sink: StatusSink) {
        self.inner.status_sinks.borrow_mut().push(sink);
    }

    pub fn status(&self, name: &str) -> Option<ProviderStatus> {
        self.provider(name).map(|h| h.status())
    }

    pub fn statuses(&self) -> Vec<(String, ProviderStatus)> {
        self.inner
            .providers
            .borrow()
            .iter()
            .map(|h| (h.name().to_string(), h.status()))
            .collect()
    }

    fn report(&self, handle: &ProviderHandle) {
        let Some(status) = handle.refresh_status() else {
            return;
        };
        tracing::info!(provider = handle.name(), status = %status, "provider status changed");
        let sinks = self.inner.status_sinks.borrow().clone();
        for sink in sinks {
            sink(handle.name(), &status);
        }
    }
}
