use super::observer::Properties;
use super::widgets::{
    EditorFactory, PropertiesEditor, WidgetConfig, WidgetDescriptor, WidgetHost, WidgetRegistry,
};
use std::cell::{Ref, RefCell};
use std::rc::Rc;

#[derive(Clone, Default)]
pub struct WidgetsState {
    pub registered: WidgetRegistry,
}

#[derive(Clone, Default)]
pub struct StoreState {
    pub widgets: WidgetsState,
}

pub enum StoreAction {
    RegisterWidget {
        name: String,
        descriptor: WidgetDescriptor,
    },
    RegisterEditor {
        tag: String,
        factory: EditorFactory,
    },
}

/// Application state handle. Bindings read widget configs from it and treat
/// everything else as opaque. Cloning yields another handle to the same state.
#[derive(Clone, Default)]
pub struct Store {
    state: Rc<RefCell<StoreState>>,
}

impl Store {
    pub fn new(registry: WidgetRegistry) -> Self {
        Self {
            state: Rc::new(RefCell::new(StoreState {
                widgets: WidgetsState {
                    registered: registry,
                },
            })),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(WidgetRegistry::with_defaults())
    }

    pub fn get_state(&self) -> Ref<'_, StoreState> {
        self.state.borrow()
    }

    pub fn dispatch(&self, action: StoreAction) {
        let mut state = self.state.borrow_mut();
        match action {
            StoreAction::RegisterWidget { name, descriptor } => {
                tracing::debug!(widget = %name, "registering widget type");
                state.widgets.registered.register(&name, descriptor);
            }
            StoreAction::RegisterEditor { tag, factory } => {
                state.widgets.registered.register_editor(&tag, factory);
            }
        }
    }

    pub fn register_widget(&self, name: &str, descriptor: WidgetDescriptor) {
        self.dispatch(StoreAction::RegisterWidget {
            name: name.to_string(),
            descriptor,
        });
    }

    pub fn register_editor(&self, tag: &str, factory: EditorFactory) {
        self.dispatch(StoreAction::RegisterEditor {
            tag: tag.to_string(),
            factory,
        });
    }

    pub fn widget_config(&self, name: &str) -> Option<WidgetConfig> {
        self.get_state().widgets.registered.config(name)
    }

    pub fn default_properties(&self, name: &str) -> Option<Properties> {
        self.get_state().widgets.registered.default_properties(name)
    }

    /// Instantiate a widget. The store is not borrowed while the widget's
    /// constructor runs.
    pub fn create_widget(&self, name: &str) -> Option<Box<dyn WidgetHost>> {
        let descriptor = self.get_state().widgets.registered.descriptor(name).cloned();
        descriptor.map(|d| d.create())
    }

    pub fn create_editor(&self, tag: &str) -> Option<Box<dyn PropertiesEditor>> {
        let factory = self.get_state().widgets.registered.editor(tag);
        factory.map(|f| f())
    }
}
