use serde_json::{json, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use telemetry_dashboard::providers::{
    manager::PREVIEW_TYPE, PreviewProvider, ProviderStatus, RemoteProvider, SourceManager,
    SourceProvider, TelemetryClient, TransportError,
};
use telemetry_dashboard::table::{CanonicalTable, TableEntry, TableValue, TypeTag};

fn collect_updates() -> (Rc<RefCell<Vec<(String, TableEntry)>>>, Rc<dyn Fn(&str, TableEntry)>) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&seen);
    let update: Rc<dyn Fn(&str, TableEntry)> = Rc::new(move |key: &str, entry: TableEntry| {
        log.borrow_mut().push((key.to_string(), entry));
    });
    (seen, update)
}

fn preview_with(entries: &[(&str, TableValue)]) -> PreviewProvider {
    let sources: BTreeMap<String, TableEntry> = entries
        .iter()
        .map(|(k, v)| (k.to_string(), TableEntry::new(k, v.clone())))
        .collect();
    PreviewProvider::new(sources)
}

#[test]
fn snapshot_covers_every_key_once() {
    let mut provider = preview_with(&[
        ("/a", 1.0.into()),
        ("/b", true.into()),
        ("/c", "x".into()),
    ]);
    let (seen, update) = collect_updates();
    provider.update_from_provider(update);
    let keys: Vec<String> = seen.borrow().iter().map(|(k, _)| k.clone()).collect();
    assert_eq!(keys, vec!["/a", "/b", "/c"]);
}

#[test]
fn type_changing_write_is_dropped_and_repeat_write_is_idempotent() {
    let mut provider = preview_with(&[("/k", 1.0.into())]);
    provider.update_from_dashboard("/k", &json!("text"));
    assert_eq!(provider.sources()["/k"].value, TableValue::Number(1.0));
    assert_eq!(provider.sources()["/k"].type_tag, TypeTag::Number);

    provider.update_from_dashboard("/k", &json!(5));
    provider.update_from_dashboard("/k", &json!(5));
    assert_eq!(provider.sources()["/k"].value, TableValue::Number(5.0));
}

#[test]
fn unknown_shapes_are_ignored() {
    let mut provider = PreviewProvider::default();
    provider.update_from_dashboard("/obj", &json!({"nested": 1}));
    provider.update_from_dashboard("/null", &Value::Null);
    provider.update_from_dashboard("/mixed", &json!([1, "a"]));
    assert!(provider.sources().is_empty());
}

#[test]
fn preview_forwards_dashboard_writes_once_running() {
    let mut provider = preview_with(&[("/k", 1.0.into())]);
    let (seen, update) = collect_updates();
    provider.update_from_provider(update);
    provider.update_from_dashboard("/k", &json!(9));
    provider.update_from_dashboard("/new", &json!("hello"));

    let seen = seen.borrow();
    assert_eq!(seen.len(), 3);
    assert_eq!(seen[1].1.value, TableValue::Number(9.0));
    assert_eq!(seen[2].0, "/new");
    assert_eq!(seen[2].1.name, "/new");
}

#[derive(Default)]
struct MockState {
    remote: BTreeMap<String, TableEntry>,
    changes: Vec<(String, TableEntry)>,
    writes: Vec<(String, TableValue)>,
    online: bool,
}

struct MockClient(Rc<RefCell<MockState>>);

impl TelemetryClient for MockClient {
    fn connect(&mut self) -> Result<(), TransportError> {
        if self.0.borrow().online {
            Ok(())
        } else {
            Err(TransportError::Disconnected("mock".into()))
        }
    }

    fn snapshot(&mut self) -> Result<Vec<(String, TableEntry)>, TransportError> {
        let state = self.0.borrow();
        Ok(state
            .remote
            .iter()
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect())
    }

    fn drain_changes(&mut self) -> Result<Vec<(String, TableEntry)>, TransportError> {
        let mut state = self.0.borrow_mut();
        if !state.online {
            return Err(TransportError::Io("link down".into()));
        }
        Ok(std::mem::take(&mut state.changes))
    }

    fn write(&mut self, key: &str, value: &TableValue) -> Result<(), TransportError> {
        self.0
            .borrow_mut()
            .writes
            .push((key.to_string(), value.clone()));
        Ok(())
    }

    fn value_type(&self, key: &str) -> Option<TypeTag> {
        self.0.borrow().remote.get(key).map(|e| e.type_tag)
    }
}

fn remote_state() -> Rc<RefCell<MockState>> {
    let mut state = MockState {
        online: true,
        ..Default::default()
    };
    state
        .remote
        .insert("/r/speed".into(), TableEntry::new("/r/speed", 1.5.into()));
    Rc::new(RefCell::new(state))
}

#[test]
fn remote_provider_snapshots_then_forwards_to_network() {
    let state = remote_state();
    let mut provider = RemoteProvider::new(Box::new(MockClient(Rc::clone(&state))));
    let (seen, update) = collect_updates();
    provider.update_from_provider(update);
    assert_eq!(provider.status(), ProviderStatus::Connected);
    assert_eq!(seen.borrow().len(), 1);

    provider.update_from_dashboard("/r/speed", &json!(2.5));
    provider.update_from_dashboard("/r/speed", &json!("fast"));
    assert_eq!(
        state.borrow().writes,
        vec![("/r/speed".to_string(), TableValue::Number(2.5))]
    );
    // Remote variant does not echo dashboard writes by itself.
    assert_eq!(seen.borrow().len(), 1);

    state
        .borrow_mut()
        .changes
        .push(("/r/speed".into(), TableEntry::new("/r/speed", 2.5.into())));
    provider.poll();
    assert_eq!(seen.borrow().len(), 2);
}

#[test]
fn cached_writes_before_start_are_announced_once() {
    let state = remote_state();
    let mut provider = RemoteProvider::new(Box::new(MockClient(Rc::clone(&state))));
    provider.update_from_dashboard("/r/speed", &json!(2.0));
    provider.update_from_dashboard("/r/local", &json!(true));

    let (seen, update) = collect_updates();
    provider.update_from_provider(update);

    let keys: Vec<String> = seen.borrow().iter().map(|(k, _)| k.clone()).collect();
    assert_eq!(keys, vec!["/r/local".to_string(), "/r/speed".to_string()]);
    assert_eq!(seen.borrow()[1].1.value, TableValue::Number(1.5));
}

#[test]
fn cached_entries_are_announced_when_remote_is_down() {
    let state = remote_state();
    state.borrow_mut().online = false;
    let mut provider = RemoteProvider::new(Box::new(MockClient(Rc::clone(&state))));
    provider.update_from_dashboard("/r/local", &json!("idle"));

    let (seen, update) = collect_updates();
    provider.update_from_provider(update);
    assert!(matches!(provider.status(), ProviderStatus::Disconnected { .. }));
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(seen.borrow()[0].0, "/r/local");
}

#[test]
fn transport_failure_reports_status_instead_of_failing() {
    let state = remote_state();
    state.borrow_mut().online = false;
    let mut provider = RemoteProvider::new(Box::new(MockClient(Rc::clone(&state))));
    let (seen, update) = collect_updates();
    provider.update_from_provider(update);
    assert!(matches!(provider.status(), ProviderStatus::Disconnected { .. }));
    assert!(seen.borrow().is_empty());

    state.borrow_mut().online = true;
    provider.poll();
    assert_eq!(provider.status(), ProviderStatus::Connected);
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn manager_routes_writes_to_owner_and_reports_status() {
    let table = CanonicalTable::new();
    let manager = SourceManager::with_defaults(table.clone());
    let state = remote_state();
    state.borrow_mut().online = false;
    let client_state = Rc::clone(&state);
    manager.add_type(
        "NetworkTables",
        Rc::new(move |_settings: &Value| {
            let provider: Box<dyn SourceProvider> =
                Box::new(RemoteProvider::new(Box::new(MockClient(Rc::clone(&client_state)))));
            Ok(provider)
        }),
    );
    let statuses = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&statuses);
    manager.on_status(Rc::new(move |name: &str, status: &ProviderStatus| {
        log.borrow_mut().push((name.to_string(), status.clone()));
    }));

    manager
        .add_provider(
            PREVIEW_TYPE,
            Some("sim"),
            &json!({"sources": {"/sim/x": {"value": 3, "type": "number"}}}),
        )
        .unwrap();
    manager
        .add_provider("NetworkTables", Some("robot"), &json!({"address": "localhost"}))
        .unwrap();
    assert!(matches!(
        manager.status("robot"),
        Some(ProviderStatus::Disconnected { .. })
    ));

    state.borrow_mut().online = true;
    manager.poll();
    assert_eq!(manager.status("robot"), Some(ProviderStatus::Connected));
    assert_eq!(table.owner("/r/speed").as_deref(), Some("robot"));
    assert_eq!(statuses.borrow().last().unwrap().1, ProviderStatus::Connected);

    assert!(table.put("/r/speed", &json!(4.0)));
    assert_eq!(state.borrow().writes.len(), 1);

    // Unowned keys fall back to the first registered provider.
    assert!(table.put("/unowned", &json!(true)));
    assert_eq!(table.owner("/unowned").as_deref(), Some("sim"));
    assert_eq!(table.get("/unowned").unwrap().value, TableValue::Boolean(true));
}

#[test]
fn unknown_provider_types_are_skipped_from_settings() {
    let manager = SourceManager::with_defaults(CanonicalTable::new());
    let providers = telemetry_dashboard::settings::Settings::default().providers();
    assert_eq!(manager.add_from_settings(&providers), 0);
    assert!(manager.statuses().is_empty());
}
