use super::host::{TemplateOpts, TemplateWidget};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextViewConfig {
    #[serde(default)]
    pub prefix: String,
}

#[derive(Default)]
pub struct TextViewWidget;

impl TemplateWidget for TextViewWidget {
    fn render(&self, opts: &TemplateOpts) -> String {
        let cfg: TextViewConfig = opts.properties.decode();
        let view = opts.view();
        let text = view
            .root_entry()
            .and_then(|e| e.value.as_str())
            .unwrap_or_default();
        format!("{}{}", cfg.prefix, text)
    }
}
