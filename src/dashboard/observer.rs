//! Change-detecting property bag shared between a widget, its properties
//! editor and the binding that owns them.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A widget's property bag.
pub type Properties = Map<String, Value>;

type ChangeCallback = dyn Fn(&Properties, &Properties);

struct ObservedInner {
    values: RefCell<Properties>,
    callback: RefCell<Option<Rc<ChangeCallback>>>,
    /// Snapshot taken before the first mutation of the pending change-set.
    baseline: RefCell<Option<Properties>>,
    batch_depth: Cell<usize>,
    notifying: Cell<bool>,
}

/// Shared, observable property map. Clones share the same storage.
///
/// Each logical change-set produces exactly one callback carrying the new
/// values and the snapshot from before the change-set. Setting a key to the
/// value it already holds is not a change. Mutations made from inside the
/// callback are coalesced into one follow-up notification.
#[derive(Clone)]
pub struct ObservedMap {
    inner: Rc<ObservedInner>,
}

impl Default for ObservedMap {
    fn default() -> Self {
        Self::new(Properties::new())
    }
}

impl ObservedMap {
    pub fn new(values: Properties) -> Self {
        Self {
            inner: Rc::new(ObservedInner {
                values: RefCell::new(values),
                callback: RefCell::new(None),
                baseline: RefCell::new(None),
                batch_depth: Cell::new(0),
                notifying: Cell::new(false),
            }),
        }
    }

    /// Install the change callback, replacing any previous one.
    pub fn on_change(&self, callback: impl Fn(&Properties, &Properties) + 'static) {
        *self.inner.callback.borrow_mut() = Some(Rc::new(callback));
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.values.borrow().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.values.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.values.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.values.borrow().is_empty()
    }

    pub fn snapshot(&self) -> Properties {
        self.inner.values.borrow().clone()
    }

    /// Read the bag as a typed settings struct, falling back to its default
    /// when the values do not fit.
    pub fn decode<C: DeserializeOwned + Default>(&self) -> C {
        serde_json::from_value(Value::Object(self.snapshot())).unwrap_or_default()
    }

    pub fn set(&self, key: &str, value: Value) {
        self.batch(|map| map.stage(key, value));
    }

    /// Mutate one value in place, e.g. a nested object or array.
    pub fn modify(&self, key: &str, f: impl FnOnce(&mut Value)) {
        let mut value = self.get(key).unwrap_or(Value::Null);
        f(&mut value);
        self.set(key, value);
    }

    /// Apply every entry of `values` as one change-set.
    pub fn update(&self, values: Properties) {
        self.batch(|map| {
            for (key, value) in values {
                map.stage(&key, value);
            }
        });
    }

    /// Group mutations made inside `f` into one notification.
    pub fn batch<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        self.inner.batch_depth.set(self.inner.batch_depth.get() + 1);
        let result = f(self);
        self.inner.batch_depth.set(self.inner.batch_depth.get() - 1);
        if self.inner.batch_depth.get() == 0 {
            self.commit();
        }
        result
    }

    fn stage(&self, key: &str, value: Value) {
        let mut values = self.inner.values.borrow_mut();
        if values.get(key) == Some(&value) {
            return;
        }
        let mut baseline = self.inner.baseline.borrow_mut();
        if baseline.is_none() {
            *baseline = Some(values.clone());
        }
        values.insert(key.to_string(), value);
    }

    /// Deliver the pending change-set, if any.
    pub fn commit(&self) {
        if self.inner.notifying.get() {
            return;
        }
        self.inner.notifying.set(true);
        loop {
            let Some(previous) = self.inner.baseline.borrow_mut().take() else {
                break;
            };
            let current = self.snapshot();
            if current == previous {
                continue;
            }
            let callback = self.inner.callback.borrow().clone();
            if let Some(callback) = callback {
                callback(&current, &previous);
            }
        }
        self.inner.notifying.set(false);
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for ObservedMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObservedMap")
            .field(&*self.inner.values.borrow())
            .finish()
    }
}
