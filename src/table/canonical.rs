use super::{is_under, normalize_root, relative_to_parent, TableEntry, TypeTag};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;
use std::rc::{Rc, Weak};

/// Snapshot of every entry under a root, keyed relative to the root's parent.
pub type Subtable = BTreeMap<String, TableEntry>;

/// Receives dashboard-originated writes and forwards them to a provider.
pub type WriteSink = dyn Fn(&str, &Value);

type Listener = dyn Fn(&[String]);

/// Keeps a change listener registered. Dropping it unsubscribes.
pub struct Subscription {
    _listener: Rc<Listener>,
}

struct TableInner {
    entries: BTreeMap<String, TableEntry>,
    owners: HashMap<String, String>,
    revision: u64,
    listeners: Vec<Weak<Listener>>,
    pending: Vec<String>,
    notifying: bool,
    write_sink: Option<Rc<WriteSink>>,
}

/// Shared handle to the single source of truth. Cloning yields another handle
/// to the same table.
///
/// Writes are applied synchronously and listeners run right after, so every
/// read observes the preceding write. Writes issued from inside a listener are
/// folded into one follow-up notification.
#[derive(Clone)]
pub struct CanonicalTable {
    inner: Rc<RefCell<TableInner>>,
}

impl Default for CanonicalTable {
    fn default() -> Self {
        Self::new()
    }
}

impl CanonicalTable {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(TableInner {
                entries: BTreeMap::new(),
                owners: HashMap::new(),
                revision: 0,
                listeners: Vec::new(),
                pending: Vec::new(),
                notifying: false,
                write_sink: None,
            })),
        }
    }

    /// Store a provider emission. The emitting provider becomes the key's
    /// owner; a later emission by another provider takes ownership over.
    pub fn set(&self, owner: &str, key: &str, entry: TableEntry) {
        {
            let mut inner = self.inner.borrow_mut();
            if let Some(previous) = inner.owners.insert(key.to_string(), owner.to_string()) {
                if previous != owner {
                    tracing::debug!(key, previous = %previous, owner, "table key changed owner");
                }
            }
            inner.entries.insert(key.to_string(), entry);
            inner.revision = inner.revision.wrapping_add(1);
            inner.pending.push(key.to_string());
            if inner.notifying {
                return;
            }
            inner.notifying = true;
        }
        self.flush();
    }

    fn flush(&self) {
        loop {
            let (changed, listeners) = {
                let mut inner = self.inner.borrow_mut();
                if inner.pending.is_empty() {
                    inner.notifying = false;
                    return;
                }
                inner.listeners.retain(|l| l.strong_count() > 0);
                let listeners: Vec<Rc<Listener>> =
                    inner.listeners.iter().filter_map(Weak::upgrade).collect();
                (std::mem::take(&mut inner.pending), listeners)
            };
            for listener in listeners {
                listener(&changed);
            }
        }
    }

    /// Register a listener called with the keys touched by each write.
    pub fn subscribe(&self, listener: impl Fn(&[String]) + 'static) -> Subscription {
        let listener: Rc<Listener> = Rc::new(listener);
        self.inner
            .borrow_mut()
            .listeners
            .push(Rc::downgrade(&listener));
        Subscription {
            _listener: listener,
        }
    }

    /// Install the sink that receives [`CanonicalTable::put`] writes.
    pub fn set_write_sink(&self, sink: Rc<WriteSink>) {
        self.inner.borrow_mut().write_sink = Some(sink);
    }

    /// Push a dashboard-originated value towards the provider owning `key`.
    /// The table itself only changes once the provider echoes the value back.
    pub fn put(&self, key: &str, value: &Value) -> bool {
        let sink = self.inner.borrow().write_sink.clone();
        match sink {
            Some(sink) => {
                sink(key, value);
                true
            }
            None => {
                tracing::debug!(key, "no write sink installed; dashboard write dropped");
                false
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<TableEntry> {
        self.inner.borrow().entries.get(key).cloned()
    }

    pub fn owner(&self, key: &str) -> Option<String> {
        self.inner.borrow().owners.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.borrow().entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().entries.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.inner.borrow().revision
    }

    fn for_each_under(&self, root: &str, mut f: impl FnMut(&str, &TableEntry)) {
        let root = normalize_root(root);
        let inner = self.inner.borrow();
        let range = inner
            .entries
            .range::<str, _>((Bound::Included(root), Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(root));
        for (key, entry) in range {
            if is_under(key, root) {
                f(key, entry);
            }
        }
    }

    /// Tags of every value whose key equals or is nested under `root`.
    /// An empty set means no data yet.
    pub fn get_types(&self, root: &str) -> BTreeSet<TypeTag> {
        let mut types = BTreeSet::new();
        self.for_each_under(root, |_, entry| {
            types.insert(entry.type_tag);
        });
        types
    }

    /// Snapshot of every entry under `root`.
    pub fn get_subtable(&self, root: &str) -> Subtable {
        let mut table = Subtable::new();
        self.for_each_under(root, |key, entry| {
            table.insert(relative_to_parent(key, root).to_string(), entry.clone());
        });
        table
    }
}
