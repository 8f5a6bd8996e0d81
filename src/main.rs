use futures::executor::LocalPool;
use serde_json::json;
use telemetry_dashboard::dashboard::{Dashboard, Store};
use telemetry_dashboard::logging;
use telemetry_dashboard::providers::{manager::PREVIEW_TYPE, SourceManager};
use telemetry_dashboard::settings::Settings;
use telemetry_dashboard::table::CanonicalTable;

fn demo_sources() -> serde_json::Value {
    json!({
        "sources": {
            "/SmartDashboard/Speed": { "value": 0.25, "type": "number", "name": "Speed" },
            "/SmartDashboard/Mode": { "value": "auto", "type": "string", "name": "Mode" },
            "/SmartDashboard/Enabled": { "value": true, "type": "boolean", "name": "Enabled" }
        }
    })
}

fn main() -> anyhow::Result<()> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "settings.json".into());
    let settings = Settings::load(&path)?;
    logging::init(settings.debug_logging, settings.log_file.clone());

    let table = CanonicalTable::new();
    let sources = SourceManager::with_defaults(table.clone());
    let started = sources.add_from_settings(&settings.providers());
    if started == 0 {
        tracing::info!("no configured provider could start; using preview data");
        sources.add_provider(PREVIEW_TYPE, Some("demo"), &demo_sources());
    }

    let store = Store::with_defaults();
    let mut dashboard = Dashboard::new(store.clone(), table.clone(), sources);
    let mut pool = LocalPool::new();

    for key in table.keys() {
        let types = table.get_types(&key);
        let candidates = store.get_state().widgets.registered.accepting(&types);
        let Some(widget_type) = candidates.first() else {
            continue;
        };
        let binding = dashboard.place(&key);
        binding.set_root(&key, false);
        if !pool.run_until(binding.set_widget_type(widget_type)) {
            tracing::warn!(key = %key, widget_type = %widget_type, "could not bind widget");
        }
    }

    dashboard.poll();
    for id in dashboard.ids() {
        if let Some(binding) = dashboard.binding(&id) {
            println!(
                "{:<28} {}",
                binding.title(),
                binding.output().unwrap_or_default()
            );
        }
    }
    Ok(())
}
