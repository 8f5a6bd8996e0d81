use super::host::{ElementChange, ElementState, ElementWidget};
use crate::table::TableValue;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

fn default_color() -> String {
    "blue".into()
}

fn default_buffer_size() -> usize {
    50
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            color: default_color(),
            buffer_size: default_buffer_size(),
        }
    }
}

/// Rolling plot of a numeric value. Arrays contribute their last element.
#[derive(Default)]
pub struct GraphWidget {
    samples: VecDeque<f64>,
}

impl GraphWidget {
    pub fn samples(&self) -> Vec<f64> {
        self.samples.iter().copied().collect()
    }

    fn sample(value: &TableValue) -> Option<f64> {
        match value {
            TableValue::NumberArray(values) => values.last().copied(),
            other => other.as_f64(),
        }
    }
}

impl ElementWidget for GraphWidget {
    fn updated(&mut self, state: &ElementState, change: &ElementChange) {
        match change {
            ElementChange::Table { .. } => {
                let Some(sample) = state.view.root_entry().and_then(|e| Self::sample(&e.value))
                else {
                    return;
                };
                let cfg: GraphConfig = state.properties.decode();
                self.samples.push_back(sample);
                while self.samples.len() > cfg.buffer_size.max(1) {
                    self.samples.pop_front();
                }
            }
            ElementChange::Root { .. } => self.samples.clear(),
            _ => {}
        }
    }

    fn render(&self, state: &ElementState) -> String {
        let cfg: GraphConfig = state.properties.decode();
        let samples = &self.samples;
        match samples.back() {
            Some(last) => format!("graph[{}] {} samples, last {last}", cfg.color, samples.len()),
            None => format!("graph[{}] no data", cfg.color),
        }
    }
}
