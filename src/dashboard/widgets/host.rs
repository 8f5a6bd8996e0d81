//! Hosting strategies for widget implementations.
//!
//! The binding drives every widget through [`WidgetHost`]. Two adapters sit
//! behind it: [`ElementHost`] for self-contained stateful widgets that are
//! told which input changed, and [`TemplateHost`] for template-style widgets
//! that read a shared options object and react to named events.

use crate::dashboard::observer::{ObservedMap, Properties};
use crate::dashboard::render::RenderBarrier;
use crate::table::{normalize_root, relative_to_parent, Subtable, TableEntry};
use serde_json::Value;
use std::rc::Rc;

/// The slice of the canonical table a widget is shown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableView {
    pub root: Option<String>,
    pub table: Subtable,
}

impl TableView {
    pub fn new(root: &str, table: Subtable) -> Self {
        Self {
            root: Some(root.to_string()),
            table,
        }
    }

    /// View with no values, used while data is missing or mistyped.
    pub fn empty(root: Option<&str>) -> Self {
        Self {
            root: root.map(str::to_string),
            table: Subtable::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Entry stored at the root key itself.
    pub fn root_entry(&self) -> Option<&TableEntry> {
        let root = normalize_root(self.root.as_deref()?);
        self.table.get(relative_to_parent(root, root))
    }
}

/// Lets a widget push values back through the binding. Writes outside the
/// binding's root are refused.
#[derive(Clone)]
pub struct TableWriter {
    write: Rc<dyn Fn(&str, &Value) -> bool>,
}

impl TableWriter {
    pub fn new(write: impl Fn(&str, &Value) -> bool + 'static) -> Self {
        Self {
            write: Rc::new(write),
        }
    }

    /// Writer that refuses everything.
    pub fn detached() -> Self {
        Self::new(|_, _| false)
    }

    pub fn write(&self, key: &str, value: &Value) -> bool {
        (self.write)(key, value)
    }
}

/// Everything a widget receives when it is mounted.
#[derive(Clone)]
pub struct MountContext {
    pub view: TableView,
    pub properties: ObservedMap,
    pub writer: TableWriter,
    pub barrier: RenderBarrier,
}

pub trait WidgetHost {
    fn mount(&mut self, ctx: MountContext);
    /// A property change-set landed; `prev` is the bag from before it.
    fn update(&mut self, properties: &Properties, prev: &Properties);
    /// New table data; the widget re-renders.
    fn refresh(&mut self, view: &TableView);
    fn resize(&mut self);
    fn unmount(&mut self);
    fn is_mounted(&self) -> bool;
    /// Most recent rendered frame.
    fn output(&self) -> &str;
    fn render_count(&self) -> usize;
}

/// Which input of an element widget changed.
#[derive(Debug, Clone, PartialEq)]
pub enum ElementChange {
    Table { prev: Subtable },
    Root { prev: Option<String> },
    Properties { prev: Properties },
    Resized,
}

/// State an element widget renders from. The host owns it and assigns new
/// inputs before asking the widget to update.
pub struct ElementState {
    pub view: TableView,
    pub properties: ObservedMap,
    pub writer: TableWriter,
}

pub trait ElementWidget {
    fn updated(&mut self, _state: &ElementState, _change: &ElementChange) {}
    fn render(&self, state: &ElementState) -> String;
}

pub struct ElementHost<W> {
    widget: W,
    state: Option<ElementState>,
    barrier: RenderBarrier,
    frame: String,
    renders: usize,
}

impl<W: ElementWidget> ElementHost<W> {
    pub fn new(widget: W) -> Self {
        Self {
            widget,
            state: None,
            barrier: RenderBarrier::new(),
            frame: String::new(),
            renders: 0,
        }
    }

    pub fn widget(&self) -> &W {
        &self.widget
    }

    fn notify(&mut self, change: ElementChange) {
        if let Some(state) = &self.state {
            self.widget.updated(state, &change);
        }
    }

    fn request_update(&mut self) {
        let Some(state) = &self.state else {
            return;
        };
        let _render = self.barrier.begin();
        self.frame = self.widget.render(state);
        self.renders += 1;
    }
}

impl<W: ElementWidget> WidgetHost for ElementHost<W> {
    fn mount(&mut self, ctx: MountContext) {
        self.barrier = ctx.barrier;
        self.state = Some(ElementState {
            view: ctx.view,
            properties: ctx.properties,
            writer: ctx.writer,
        });
        self.request_update();
    }

    fn update(&mut self, _properties: &Properties, prev: &Properties) {
        self.notify(ElementChange::Properties { prev: prev.clone() });
        self.request_update();
    }

    fn refresh(&mut self, view: &TableView) {
        let Some(state) = self.state.as_mut() else {
            return;
        };
        let prev_table = std::mem::replace(&mut state.view.table, view.table.clone());
        let prev_root = std::mem::replace(&mut state.view.root, view.root.clone());
        if prev_root != view.root {
            self.notify(ElementChange::Root { prev: prev_root });
        }
        self.notify(ElementChange::Table { prev: prev_table });
        self.request_update();
    }

    fn resize(&mut self) {
        self.notify(ElementChange::Resized);
        self.request_update();
    }

    fn unmount(&mut self) {
        self.state = None;
        self.frame.clear();
    }

    fn is_mounted(&self) -> bool {
        self.state.is_some()
    }

    fn output(&self) -> &str {
        &self.frame
    }

    fn render_count(&self) -> usize {
        self.renders
    }
}

/// Options object shared with a template widget.
pub struct TemplateOpts {
    pub table: Subtable,
    pub root: Option<String>,
    pub properties: ObservedMap,
    pub writer: TableWriter,
}

impl TemplateOpts {
    pub fn view(&self) -> TableView {
        TableView {
            root: self.root.clone(),
            table: self.table.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateEvent {
    PropertiesUpdate,
    Resize,
}

pub trait TemplateWidget {
    fn on(&mut self, _event: TemplateEvent, _opts: &TemplateOpts) {}
    fn render(&self, opts: &TemplateOpts) -> String;
}

pub struct TemplateHost<T> {
    tag: T,
    opts: Option<TemplateOpts>,
    barrier: RenderBarrier,
    frame: String,
    renders: usize,
}

impl<T: TemplateWidget> TemplateHost<T> {
    pub fn new(tag: T) -> Self {
        Self {
            tag,
            opts: None,
            barrier: RenderBarrier::new(),
            frame: String::new(),
            renders: 0,
        }
    }

    pub fn tag(&self) -> &T {
        &self.tag
    }

    fn trigger(&mut self, event: TemplateEvent) {
        if let Some(opts) = &self.opts {
            self.tag.on(event, opts);
        }
    }

    fn update_tag(&mut self) {
        let Some(opts) = &self.opts else {
            return;
        };
        let _render = self.barrier.begin();
        self.frame = self.tag.render(opts);
        self.renders += 1;
    }
}

impl<T: TemplateWidget> WidgetHost for TemplateHost<T> {
    fn mount(&mut self, ctx: MountContext) {
        self.barrier = ctx.barrier;
        self.opts = Some(TemplateOpts {
            table: ctx.view.table,
            root: ctx.view.root,
            properties: ctx.properties,
            writer: ctx.writer,
        });
        self.update_tag();
    }

    fn update(&mut self, _properties: &Properties, _prev: &Properties) {
        self.trigger(TemplateEvent::PropertiesUpdate);
        self.update_tag();
    }

    fn refresh(&mut self, view: &TableView) {
        if let Some(opts) = self.opts.as_mut() {
            opts.table = view.table.clone();
            opts.root = view.root.clone();
        }
        self.update_tag();
    }

    fn resize(&mut self) {
        self.trigger(TemplateEvent::Resize);
        self.update_tag();
    }

    fn unmount(&mut self) {
        self.opts = None;
        self.frame.clear();
    }

    fn is_mounted(&self) -> bool {
        self.opts.is_some()
    }

    fn output(&self) -> &str {
        &self.frame
    }

    fn render_count(&self) -> usize {
        self.renders
    }
}

/// Companion editor for a widget's property bag.
pub trait PropertiesEditor {
    fn mount(&mut self, properties: ObservedMap);
    /// Render the editor, returning its frame.
    fn request_render(&mut self) -> String;
    fn unmount(&mut self) {}
}

pub type EditorFactory = Rc<dyn Fn() -> Box<dyn PropertiesEditor>>;
