use super::host::{ElementState, ElementWidget};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumberBarConfig {
    #[serde(default = "default_min")]
    pub min: f64,
    #[serde(default = "default_max")]
    pub max: f64,
    #[serde(default)]
    pub center: f64,
}

fn default_min() -> f64 {
    -1.0
}

fn default_max() -> f64 {
    1.0
}

impl Default for NumberBarConfig {
    fn default() -> Self {
        Self {
            min: default_min(),
            max: default_max(),
            center: 0.0,
        }
    }
}

const WIDTH: usize = 20;

/// Horizontal bar filled from `center` towards the value.
#[derive(Default)]
pub struct NumberBarWidget;

impl NumberBarWidget {
    fn cell(cfg: &NumberBarConfig, value: f64) -> usize {
        let span = cfg.max - cfg.min;
        if span <= 0.0 {
            return 0;
        }
        let ratio = ((value - cfg.min) / span).clamp(0.0, 1.0);
        (ratio * WIDTH as f64).round() as usize
    }
}

impl ElementWidget for NumberBarWidget {
    fn render(&self, state: &ElementState) -> String {
        let cfg: NumberBarConfig = state.properties.decode();
        let Some(value) = state.view.root_entry().and_then(|e| e.value.as_f64()) else {
            return format!("[{}] --", "-".repeat(WIDTH));
        };
        let value = value.clamp(cfg.min.min(cfg.max), cfg.max.max(cfg.min));
        let at = Self::cell(&cfg, value);
        let origin = Self::cell(&cfg, cfg.center);
        let (lo, hi) = (at.min(origin), at.max(origin));
        let bar: String = (0..WIDTH)
            .map(|i| if i >= lo && i < hi { '#' } else { '-' })
            .collect();
        format!("[{bar}] {value:.2}")
    }
}
