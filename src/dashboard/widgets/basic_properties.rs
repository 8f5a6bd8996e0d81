use super::host::PropertiesEditor;
use crate::dashboard::observer::ObservedMap;

/// Generic editor listing every property as `key: value`.
#[derive(Default)]
pub struct BasicPropertiesEditor {
    properties: Option<ObservedMap>,
}

impl PropertiesEditor for BasicPropertiesEditor {
    fn mount(&mut self, properties: ObservedMap) {
        self.properties = Some(properties);
    }

    fn request_render(&mut self) -> String {
        let Some(properties) = &self.properties else {
            return String::new();
        };
        properties
            .snapshot()
            .iter()
            .map(|(key, value)| format!("{key}: {value}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn unmount(&mut self) {
        self.properties = None;
    }
}
