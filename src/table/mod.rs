//! The canonical key-value table shared by every provider and widget.
//!
//! Keys are hierarchical paths such as `/SmartDashboard/Auto/Mode`. A key is
//! "under" a root when it equals the root or continues it with a `/`
//! separator. The roots `""` and `"/"` cover the whole table.

pub mod canonical;
pub mod value;

pub use canonical::{CanonicalTable, Subscription, Subtable, WriteSink};
pub use value::{TableEntry, TableValue, TypeTag};

/// Strip trailing separators so `/a/` and `/a` address the same node.
pub fn normalize_root(root: &str) -> &str {
    root.trim_end_matches('/')
}

/// Whether `key` equals `root` or is nested below it.
pub fn is_under(key: &str, root: &str) -> bool {
    let root = normalize_root(root);
    if root.is_empty() {
        return true;
    }
    match key.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// Name of `key` relative to the parent of `root`, so the root node keeps its
/// own last path segment (`/a/b/c` under `/a/b` becomes `/b/c`).
pub fn relative_to_parent<'a>(key: &'a str, root: &str) -> &'a str {
    let root = normalize_root(root);
    match root.rfind('/') {
        Some(idx) if key.len() >= idx => &key[idx..],
        _ => key,
    }
}
