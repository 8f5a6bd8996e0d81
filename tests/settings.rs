use serde_json::json;
use tempfile::tempdir;
use telemetry_dashboard::settings::{ProviderList, ProviderSettings, Settings};

#[test]
fn missing_file_yields_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let settings = Settings::load(path.to_str().unwrap()).unwrap();
    assert_eq!(settings, Settings::default());
    assert!(!settings.debug_logging);
}

#[test]
fn save_and_load_provider_list() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    let path = path.to_str().unwrap();

    let mut preview = ProviderSettings::new("Preview", json!({"sources": {}}));
    preview.name = Some("sim".into());
    let settings = Settings {
        debug_logging: true,
        log_file: None,
        providers: ProviderList::Many(vec![
            preview,
            ProviderSettings::new("NetworkTables", json!({"address": "10.0.0.2"})),
        ]),
    };
    settings.save(path).unwrap();

    let loaded = Settings::load(path).unwrap();
    assert_eq!(loaded, settings);
    let providers = loaded.providers();
    assert_eq!(providers.len(), 2);
    assert_eq!(providers[0].name.as_deref(), Some("sim"));
    assert_eq!(providers[1].settings["address"], "10.0.0.2");
}

#[test]
fn malformed_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(Settings::load(path.to_str().unwrap()).is_err());
}
