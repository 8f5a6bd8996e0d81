//! Widget binding engine: placed widgets, their property bags and the
//! hosting of widget implementations.

pub mod binding;
pub mod dashboard;
pub mod observer;
pub mod render;
pub mod store;
pub mod widgets;

pub use binding::{BindingState, WidgetBinding};
pub use dashboard::{Dashboard, WidgetSlot};
pub use observer::{ObservedMap, Properties};
pub use render::{RenderBarrier, RenderGuard};
pub use store::{Store, StoreAction, StoreState, WidgetsState};
pub use widgets::{
    accepts, WidgetConfig, WidgetConfigError, WidgetDescriptor, WidgetFactory, WidgetRegistry,
};
