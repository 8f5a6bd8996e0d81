use super::observer::{ObservedMap, Properties};
use super::render::{RenderBarrier, RenderGuard};
use super::store::Store;
use super::widgets::{
    MountContext, PropertiesEditor, TableView, TableWriter, WidgetConfig, WidgetHost,
};
use crate::table::{is_under, CanonicalTable, Subscription, TypeTag};
use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingState {
    /// No root key yet.
    Unbound,
    /// Root set, no widget type chosen.
    RootBound,
    /// A widget type switch is waiting for the current render to settle.
    TypeResolving,
    /// Widget type selected and mounted.
    Bound,
    Destroyed,
}

struct BindingInner {
    store: Store,
    table: CanonicalTable,
    barrier: RenderBarrier,
    root: RefCell<Option<String>>,
    widget_type: RefCell<Option<String>>,
    config: RefCell<Option<WidgetConfig>>,
    properties: RefCell<ObservedMap>,
    prev_properties: RefCell<Properties>,
    view: RefCell<TableView>,
    title: RefCell<Option<String>>,
    host: RefCell<Option<Box<dyn WidgetHost>>>,
    editor: RefCell<Option<Box<dyn PropertiesEditor>>>,
    /// Bumped on every type switch so callbacks of replaced property maps
    /// are ignored.
    generation: Cell<u64>,
    pending: Cell<usize>,
    destroyed: Cell<bool>,
    deferred_sync: Cell<bool>,
    deferred_resize: Cell<bool>,
    deferred_props: RefCell<Option<(Properties, Properties)>>,
    subscription: RefCell<Option<Subscription>>,
}

/// State machine of one placed widget.
///
/// It points at a root key of the canonical table, resolves which widget type
/// renders it, keeps the widget's property bag and feeds table changes to the
/// mounted widget. Clones are handles to the same binding.
///
/// Calls that arrive while the widget itself is running (a widget writing a
/// property from its own render, say) are deferred and replayed once the
/// widget returns, so a widget is never re-entered.
#[derive(Clone)]
pub struct WidgetBinding {
    inner: Rc<BindingInner>,
}

impl WidgetBinding {
    pub fn new(store: Store, table: CanonicalTable) -> Self {
        let binding = Self {
            inner: Rc::new(BindingInner {
                store,
                table: table.clone(),
                barrier: RenderBarrier::new(),
                root: RefCell::new(None),
                widget_type: RefCell::new(None),
                config: RefCell::new(None),
                properties: RefCell::new(ObservedMap::default()),
                prev_properties: RefCell::new(Properties::new()),
                view: RefCell::new(TableView::default()),
                title: RefCell::new(None),
                host: RefCell::new(None),
                editor: RefCell::new(None),
                generation: Cell::new(0),
                pending: Cell::new(0),
                destroyed: Cell::new(false),
                deferred_sync: Cell::new(false),
                deferred_resize: Cell::new(false),
                deferred_props: RefCell::new(None),
                subscription: RefCell::new(None),
            }),
        };
        let weak = Rc::downgrade(&binding.inner);
        let subscription = table.subscribe(move |keys| {
            if let Some(binding) = Self::from_weak(&weak) {
                binding.table_changed(keys);
            }
        });
        *binding.inner.subscription.borrow_mut() = Some(subscription);
        binding
    }

    fn from_weak(weak: &Weak<BindingInner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    pub fn state(&self) -> BindingState {
        if self.inner.destroyed.get() {
            BindingState::Destroyed
        } else if self.inner.pending.get() > 0 {
            BindingState::TypeResolving
        } else if self.inner.widget_type.borrow().is_some() {
            BindingState::Bound
        } else if self.inner.root.borrow().is_some() {
            BindingState::RootBound
        } else {
            BindingState::Unbound
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.get()
    }

    pub fn root(&self) -> Option<String> {
        self.inner.root.borrow().clone()
    }

    pub fn widget_type(&self) -> Option<String> {
        self.inner.widget_type.borrow().clone()
    }

    /// Resolved config of the bound widget type.
    pub fn config(&self) -> Option<WidgetConfig> {
        self.inner.config.borrow().clone()
    }

    pub fn properties(&self) -> ObservedMap {
        self.inner.properties.borrow().clone()
    }

    pub fn prev_properties(&self) -> Properties {
        self.inner.prev_properties.borrow().clone()
    }

    /// The table view most recently delivered to the widget.
    pub fn table_view(&self) -> TableView {
        self.inner.view.borrow().clone()
    }

    pub fn barrier(&self) -> &RenderBarrier {
        &self.inner.barrier
    }

    /// Hold a render cycle open. Widget type switches wait for it.
    pub fn begin_render(&self) -> RenderGuard {
        self.inner.barrier.begin()
    }

    /// Whether `widget_type` accepts the tags in `types`. Unknown types accept
    /// nothing.
    pub fn is_accepted_type(&self, types: &BTreeSet<TypeTag>, widget_type: &str) -> bool {
        self.inner
            .store
            .widget_config(widget_type)
            .map_or(false, |config| config.accepts(types))
    }

    /// Point the binding at `root`.
    ///
    /// Accepted when `ignore_type` is set, when no widget type is chosen yet,
    /// or when the bound type accepts the tags observed at `root`. Returns
    /// `false` and leaves the binding untouched otherwise.
    pub fn set_root(&self, root: &str, ignore_type: bool) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let types = self.inner.table.get_types(root);
        let accepted = ignore_type
            || self
                .inner
                .config
                .borrow()
                .as_ref()
                .map_or(true, |config| config.accepts(&types));
        if !accepted {
            tracing::debug!(root, widget_type = ?self.widget_type(), "root rejected by widget type");
            return false;
        }
        *self.inner.root.borrow_mut() = Some(root.to_string());
        self.sync_from_table();
        true
    }

    /// Switch the widget implementation once the current render settles.
    ///
    /// Resolves to `false` when the type is unknown, does not accept the
    /// root's data, or the binding was destroyed in the meantime; the previous
    /// widget, properties and editor are then kept as they were.
    pub fn set_widget_type(&self, widget_type: &str) -> LocalBoxFuture<'static, bool> {
        let pending = PendingTransition::new(Rc::clone(&self.inner));
        let settled = self.inner.barrier.settled();
        let widget_type = widget_type.to_string();
        async move {
            settled.await;
            let binding = Self {
                inner: Rc::clone(&pending.inner),
            };
            // A render may have begun between release and this poll.
            while !binding.is_destroyed() && !binding.inner.barrier.is_settled() {
                binding.inner.barrier.settled().await;
            }
            let switched = binding.apply_widget_type(&widget_type);
            drop(pending);
            switched
        }
        .boxed_local()
    }

    fn apply_widget_type(&self, widget_type: &str) -> bool {
        if self.is_destroyed() {
            tracing::debug!(widget_type, "binding destroyed before widget type switch");
            return false;
        }
        let Some(config) = self.inner.store.widget_config(widget_type) else {
            tracing::warn!(widget_type, "unknown or invalid widget type");
            return false;
        };
        let types = self
            .root()
            .map(|root| self.inner.table.get_types(&root))
            .unwrap_or_default();
        if !config.accepts(&types) {
            tracing::debug!(widget_type, ?types, "widget type rejected for root");
            return false;
        }
        if self.inner.host.try_borrow_mut().is_err() {
            tracing::warn!(widget_type, "widget busy; type switch dropped");
            return false;
        }
        let Some(host) = self.inner.store.create_widget(widget_type) else {
            return false;
        };

        let generation = self.inner.generation.get().wrapping_add(1);
        self.inner.generation.set(generation);
        let properties = ObservedMap::new(config.properties.defaults.clone());
        self.watch(&properties, generation);
        *self.inner.prev_properties.borrow_mut() = properties.snapshot();
        *self.inner.properties.borrow_mut() = properties.clone();
        self.inner.deferred_props.borrow_mut().take();

        let previous = self
            .inner
            .host
            .try_borrow_mut()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(mut previous) = previous {
            previous.unmount();
        }

        let editor_tag = config.properties.tag.clone();
        *self.inner.widget_type.borrow_mut() = Some(widget_type.to_string());
        *self.inner.config.borrow_mut() = Some(config);

        let view = self.compute_view();
        *self.inner.view.borrow_mut() = view.clone();
        if let Ok(mut slot) = self.inner.host.try_borrow_mut() {
            *slot = Some(host);
        }
        let ctx = MountContext {
            view,
            properties: properties.clone(),
            writer: self.writer(),
            barrier: self.inner.barrier.clone(),
        };
        self.with_host(|host| host.mount(ctx));

        self.mount_editor(editor_tag.as_deref(), properties);
        self.sync_from_table();
        tracing::info!(widget_type, root = ?self.root(), "widget type set");
        true
    }

    fn mount_editor(&self, tag: Option<&str>, properties: ObservedMap) {
        let previous = self
            .inner
            .editor
            .try_borrow_mut()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(mut previous) = previous {
            previous.unmount();
        }
        let Some(tag) = tag else {
            return;
        };
        let Some(mut editor) = self.inner.store.create_editor(tag) else {
            tracing::warn!(editor = tag, "properties editor not registered");
            return;
        };
        editor.mount(properties);
        if let Ok(mut slot) = self.inner.editor.try_borrow_mut() {
            *slot = Some(editor);
        }
    }

    fn watch(&self, properties: &ObservedMap, generation: u64) {
        let weak = Rc::downgrade(&self.inner);
        properties.on_change(move |current, prev| {
            let Some(binding) = Self::from_weak(&weak) else {
                return;
            };
            if binding.inner.generation.get() == generation {
                binding.properties_changed(current, prev);
            }
        });
    }

    fn writer(&self) -> TableWriter {
        let weak = Rc::downgrade(&self.inner);
        TableWriter::new(move |key, value| {
            Self::from_weak(&weak).map_or(false, |binding| binding.write(key, value))
        })
    }

    fn compute_view(&self) -> TableView {
        let Some(root) = self.root() else {
            return TableView::empty(None);
        };
        let types = self.inner.table.get_types(&root);
        let accepted = self
            .inner
            .config
            .borrow()
            .as_ref()
            .map_or(true, |config| config.accepts(&types));
        if accepted {
            TableView::new(&root, self.inner.table.get_subtable(&root))
        } else {
            TableView::empty(Some(&root))
        }
    }

    fn table_changed(&self, keys: &[String]) {
        let relevant = match self.inner.root.borrow().as_deref() {
            Some(root) => keys.iter().any(|key| is_under(key, root)),
            None => false,
        };
        if relevant {
            self.sync_from_table();
        }
    }

    /// Re-read the root and hand the widget its current view. When the root's
    /// tags are no longer accepted the widget stays mounted and is shown an
    /// empty view.
    pub fn sync_from_table(&self) {
        if self.is_destroyed() || self.inner.root.borrow().is_none() {
            return;
        }
        let view = self.compute_view();
        *self.inner.view.borrow_mut() = view.clone();
        if !self.with_host(|host| host.refresh(&view)) {
            self.inner.deferred_sync.set(true);
        }
    }

    fn properties_changed(&self, current: &Properties, prev: &Properties) {
        if self.is_destroyed() {
            return;
        }
        *self.inner.prev_properties.borrow_mut() = prev.clone();
        if !self.with_host(|host| host.update(current, prev)) {
            let mut deferred = self.inner.deferred_props.borrow_mut();
            let prev = match deferred.take() {
                Some((_, earliest)) => earliest,
                None => prev.clone(),
            };
            *deferred = Some((current.clone(), prev));
        }
    }

    /// Layout changed. Forwarded to the widget only.
    pub fn on_resize(&self) {
        if self.is_destroyed() {
            return;
        }
        if !self.with_host(|host| host.resize()) {
            self.inner.deferred_resize.set(true);
        }
    }

    /// Run `f` on the mounted widget. Returns `false` when the widget is
    /// already running further up the stack.
    fn with_host(&self, f: impl FnOnce(&mut dyn WidgetHost)) -> bool {
        let ran = match self.inner.host.try_borrow_mut() {
            Ok(mut slot) => {
                if let Some(host) = slot.as_mut() {
                    f(host.as_mut());
                }
                true
            }
            Err(_) => false,
        };
        if ran {
            self.flush_deferred();
        }
        ran
    }

    fn flush_deferred(&self) {
        if self.is_destroyed() {
            self.teardown();
            return;
        }
        if self.inner.deferred_sync.replace(false) {
            self.sync_from_table();
        }
        let props = self.inner.deferred_props.borrow_mut().take();
        if let Some((current, prev)) = props {
            self.properties_changed(&current, &prev);
        }
        if self.inner.deferred_resize.replace(false) {
            self.on_resize();
        }
    }

    /// Unmount the widget and its editor. No table reads happen afterwards.
    pub fn destroy(&self) {
        if self.inner.destroyed.replace(true) {
            return;
        }
        self.inner.subscription.borrow_mut().take();
        self.teardown();
        tracing::debug!(root = ?self.root(), widget_type = ?self.widget_type(), "widget binding destroyed");
    }

    fn teardown(&self) {
        let host = self
            .inner
            .host
            .try_borrow_mut()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(mut host) = host {
            host.unmount();
        }
        let editor = self
            .inner
            .editor
            .try_borrow_mut()
            .ok()
            .and_then(|mut slot| slot.take());
        if let Some(mut editor) = editor {
            editor.unmount();
        }
    }

    /// Push a dashboard value for `key`, which must be the root or nested
    /// under it.
    pub fn write(&self, key: &str, value: &Value) -> bool {
        if self.is_destroyed() {
            return false;
        }
        let allowed = self
            .inner
            .root
            .borrow()
            .as_deref()
            .map_or(false, |root| is_under(key, root));
        if !allowed {
            tracing::debug!(key, root = ?self.root(), "write outside widget root refused");
            return false;
        }
        self.inner.table.put(key, value)
    }

    /// Explicit title, else the root, else empty.
    pub fn title(&self) -> String {
        self.inner
            .title
            .borrow()
            .clone()
            .or_else(|| self.root())
            .unwrap_or_default()
    }

    pub fn set_title(&self, title: Option<String>) {
        *self.inner.title.borrow_mut() = title.filter(|t| !t.is_empty());
    }

    pub fn has_properties(&self) -> bool {
        self.inner
            .config
            .borrow()
            .as_ref()
            .map_or(false, |config| config.properties.tag.is_some())
    }

    /// Render the properties editor, returning its frame.
    pub fn open_properties(&self) -> Option<String> {
        let frame = self
            .inner
            .editor
            .try_borrow_mut()
            .ok()
            .and_then(|mut slot| slot.as_mut().map(|editor| editor.request_render()));
        if self.is_destroyed() {
            self.teardown();
        }
        frame
    }

    /// Apply saved properties on top of the current bag as one change-set.
    pub fn set_properties(&self, values: Properties) {
        self.properties().update(values);
    }

    pub fn is_mounted(&self) -> bool {
        self.inner
            .host
            .try_borrow()
            .map(|slot| slot.as_ref().map_or(false, |host| host.is_mounted()))
            .unwrap_or(true)
    }

    /// Last frame rendered by the widget.
    pub fn output(&self) -> Option<String> {
        let slot = self.inner.host.try_borrow().ok()?;
        let output = slot.as_ref().map(|host| host.output().to_string());
        output
    }

    pub fn render_count(&self) -> usize {
        self.inner
            .host
            .try_borrow()
            .ok()
            .and_then(|slot| slot.as_ref().map(|host| host.render_count()))
            .unwrap_or_default()
    }
}

/// Marks a widget type switch as pending until the transition finishes or
/// its future is dropped.
struct PendingTransition {
    inner: Rc<BindingInner>,
}

impl PendingTransition {
    fn new(inner: Rc<BindingInner>) -> Self {
        inner.pending.set(inner.pending.get() + 1);
        Self { inner }
    }
}

impl Drop for PendingTransition {
    fn drop(&mut self) {
        self.inner
            .pending
            .set(self.inner.pending.get().saturating_sub(1));
    }
}
