use crate::dashboard::binding::WidgetBinding;
use crate::dashboard::observer::Properties;
use crate::dashboard::store::Store;
use crate::providers::SourceManager;
use crate::table::CanonicalTable;
use futures::future::{FutureExt, LocalBoxFuture};
use std::collections::BTreeMap;

/// In-memory description of one placed widget, used to re-create it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WidgetSlot {
    pub id: String,
    pub widget_type: Option<String>,
    pub root: Option<String>,
    pub title: Option<String>,
    pub properties: Properties,
}

/// The set of placed widgets sharing one store, table and source manager.
pub struct Dashboard {
    store: Store,
    table: CanonicalTable,
    sources: SourceManager,
    bindings: BTreeMap<String, WidgetBinding>,
}

impl Dashboard {
    pub fn new(store: Store, table: CanonicalTable, sources: SourceManager) -> Self {
        Self {
            store,
            table,
            sources,
            bindings: BTreeMap::new(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn table(&self) -> &CanonicalTable {
        &self.table
    }

    pub fn sources(&self) -> &SourceManager {
        &self.sources
    }

    /// Place a new, unbound widget under `id`. A widget already placed under
    /// the same id is destroyed.
    pub fn place(&mut self, id: &str) -> WidgetBinding {
        let binding = WidgetBinding::new(self.store.clone(), self.table.clone());
        if let Some(old) = self.bindings.insert(id.to_string(), binding.clone()) {
            tracing::debug!(id, "replacing placed widget");
            old.destroy();
        }
        binding
    }

    pub fn binding(&self, id: &str) -> Option<&WidgetBinding> {
        self.bindings.get(id)
    }

    pub fn remove(&mut self, id: &str) -> bool {
        match self.bindings.remove(id) {
            Some(binding) => {
                binding.destroy();
                true
            }
            None => false,
        }
    }

    pub fn ids(&self) -> Vec<String> {
        self.bindings.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn resize_all(&self) {
        for binding in self.bindings.values() {
            binding.on_resize();
        }
    }

    /// Let providers emit pending changes into the table.
    pub fn poll(&self) {
        self.sources.poll();
    }

    pub fn slots(&self) -> Vec<WidgetSlot> {
        self.bindings
            .iter()
            .map(|(id, binding)| WidgetSlot {
                id: id.clone(),
                widget_type: binding.widget_type(),
                root: binding.root(),
                title: Some(binding.title()).filter(|t| !t.is_empty()),
                properties: binding.properties().snapshot(),
            })
            .collect()
    }

    /// Re-create a widget from a slot. The root is set without type checks so
    /// the saved widget survives until live data arrives.
    pub fn restore(&mut self, slot: WidgetSlot) -> LocalBoxFuture<'static, bool> {
        let binding = self.place(&slot.id);
        if let Some(root) = &slot.root {
            binding.set_root(root, true);
        }
        let switch = slot
            .widget_type
            .as_deref()
            .map(|widget_type| binding.set_widget_type(widget_type));
        async move {
            if let Some(switch) = switch {
                if !switch.await {
                    tracing::warn!(id = %slot.id, "saved widget type could not be restored");
                    return false;
                }
            }
            binding.set_properties(slot.properties);
            binding.set_title(slot.title);
            true
        }
        .boxed_local()
    }

    /// Destroy every placed widget.
    pub fn clear(&mut self) {
        for (_, binding) in std::mem::take(&mut self.bindings) {
            binding.destroy();
        }
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.clear();
    }
}
