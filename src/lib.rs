pub mod dashboard;
pub mod logging;
pub mod providers;
pub mod settings;
pub mod table;

pub use dashboard::{Dashboard, Store, WidgetBinding};
pub use providers::{SourceManager, SourceProvider};
pub use table::CanonicalTable;
