use super::host::{TemplateEvent, TemplateOpts, TemplateWidget};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BooleanBoxConfig {
    #[serde(default = "default_true_color")]
    pub true_color: String,
    #[serde(default = "default_false_color")]
    pub false_color: String,
}

fn default_true_color() -> String {
    "green".into()
}

fn default_false_color() -> String {
    "red".into()
}

impl Default for BooleanBoxConfig {
    fn default() -> Self {
        Self {
            true_color: default_true_color(),
            false_color: default_false_color(),
        }
    }
}

/// Colored box for a boolean. Clicking toggles the value in the table.
#[derive(Default)]
pub struct BooleanBoxWidget {
    resizes: usize,
}

impl BooleanBoxWidget {
    pub fn resizes(&self) -> usize {
        self.resizes
    }

    /// Flip the value at the root key through the dashboard write path.
    pub fn toggle(opts: &TemplateOpts) -> bool {
        let view = opts.view();
        let (Some(root), Some(current)) = (
            view.root.as_deref(),
            view.root_entry().and_then(|e| e.value.as_bool()),
        ) else {
            return false;
        };
        opts.writer.write(root, &serde_json::Value::Bool(!current))
    }
}

impl TemplateWidget for BooleanBoxWidget {
    fn on(&mut self, event: TemplateEvent, _opts: &TemplateOpts) {
        if event == TemplateEvent::Resize {
            self.resizes += 1;
        }
    }

    fn render(&self, opts: &TemplateOpts) -> String {
        let cfg: BooleanBoxConfig = opts.properties.decode();
        match opts.view().root_entry().and_then(|e| e.value.as_bool()) {
            Some(true) => format!("[{}]", cfg.true_color),
            Some(false) => format!("[{}]", cfg.false_color),
            None => "[ ]".to_string(),
        }
    }
}
