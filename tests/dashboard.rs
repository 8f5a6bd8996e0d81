use futures::executor::LocalPool;
use serde_json::json;
use telemetry_dashboard::dashboard::{BindingState, Dashboard, Store, WidgetSlot};
use telemetry_dashboard::providers::{manager::PREVIEW_TYPE, SourceManager};
use telemetry_dashboard::table::{CanonicalTable, TableValue};

fn dashboard() -> Dashboard {
    let table = CanonicalTable::new();
    let sources = SourceManager::with_defaults(table.clone());
    sources
        .add_provider(
            PREVIEW_TYPE,
            None,
            &json!({"sources": {
                "/robot/speed": {"value": 0.5, "type": "number"},
                "/robot/mode": {"value": "auto", "type": "string"},
                "/robot/enabled": {"value": false, "type": "boolean"},
                "/robot/history": {"value": [1.0, 2.0], "type": "double[]"}
            }}),
        )
        .unwrap();
    Dashboard::new(Store::with_defaults(), table, sources)
}

#[test]
fn builtin_widgets_render_their_values() {
    let mut dash = dashboard();
    let mut pool = LocalPool::new();
    for (id, root, widget_type) in [
        ("speed", "/robot/speed", "number_bar"),
        ("mode", "/robot/mode", "text_view"),
        ("enabled", "/robot/enabled", "boolean_box"),
        ("history", "/robot/history", "graph"),
    ] {
        let binding = dash.place(id);
        assert!(binding.set_root(root, false));
        assert!(pool.run_until(binding.set_widget_type(widget_type)), "{widget_type}");
    }

    let output = |id: &str| dash.binding(id).unwrap().output().unwrap();
    assert!(output("speed").ends_with("0.50"), "{}", output("speed"));
    assert_eq!(output("mode"), "auto");
    assert_eq!(output("enabled"), "[red]");
    assert!(output("history").contains("last 2"), "{}", output("history"));

    dash.binding("mode")
        .unwrap()
        .properties()
        .set("prefix", json!("Mode: "));
    assert_eq!(output("mode"), "Mode: auto");

    assert!(dash
        .binding("enabled")
        .unwrap()
        .write("/robot/enabled", &json!(true)));
    assert_eq!(output("enabled"), "[green]");
}

#[test]
fn graph_keeps_a_bounded_sample_buffer() {
    let mut dash = dashboard();
    let mut pool = LocalPool::new();
    let binding = dash.place("g");
    binding.set_root("/robot/speed", false);
    assert!(pool.run_until(binding.set_widget_type("graph")));
    binding.properties().set("buffer_size", json!(2));

    for v in [1.0, 2.0, 3.0] {
        assert!(binding.write("/robot/speed", &json!(v)));
    }
    let out = binding.output().unwrap();
    assert!(out.contains("2 samples, last 3"), "{out}");
}

#[test]
fn remove_destroys_and_resize_reaches_every_widget() {
    let mut dash = dashboard();
    let mut pool = LocalPool::new();
    let a = dash.place("a");
    a.set_root("/robot/speed", false);
    assert!(pool.run_until(a.set_widget_type("number_bar")));
    let b = dash.place("b");
    b.set_root("/robot/enabled", false);
    assert!(pool.run_until(b.set_widget_type("boolean_box")));

    let before = a.render_count();
    dash.resize_all();
    assert_eq!(a.render_count(), before + 1);

    assert_eq!(dash.ids(), vec!["a".to_string(), "b".to_string()]);
    assert!(dash.remove("a"));
    assert!(!dash.remove("a"));
    assert_eq!(a.state(), BindingState::Destroyed);
    assert_eq!(dash.len(), 1);
}

#[test]
fn restore_reapplies_saved_slot_before_data_exists() {
    let mut dash = dashboard();
    let mut pool = LocalPool::new();
    let slot = WidgetSlot {
        id: "later".into(),
        widget_type: Some("number_bar".into()),
        root: Some("/robot/arm".into()),
        title: Some("Arm".into()),
        properties: json!({"max": 90.0}).as_object().cloned().unwrap(),
    };
    assert!(pool.run_until(dash.restore(slot)));

    let binding = dash.binding("later").unwrap().clone();
    assert_eq!(binding.title(), "Arm");
    assert_eq!(binding.properties().get("max"), Some(json!(90.0)));
    assert_eq!(binding.properties().get("min"), Some(json!(-1.0)));
    assert!(binding.table_view().is_empty());

    assert!(binding.write("/robot/arm", &json!(45.0)));
    assert_eq!(
        dash.table().get("/robot/arm").unwrap().value,
        TableValue::Number(45.0)
    );
    assert_eq!(binding.table_view().table.len(), 1);

    let slots = dash.slots();
    assert_eq!(slots.len(), 1);
    assert_eq!(slots[0].root.as_deref(), Some("/robot/arm"));
}
