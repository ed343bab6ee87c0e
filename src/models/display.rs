// Live display frame handed to render targets once per tick

use serde::{Deserialize, Serialize};

use super::ExperimentSummary;

/// One display line. `None` means "no data" (zero denominator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Figure {
    pub key: String,
    pub label: String,
    pub overall: Option<f64>,
    pub window: Option<f64>,
}

/// Experiment window state as seen by render targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ExperimentView {
    Idle,
    Armed { remaining_secs: f64 },
    Running { remaining_secs: f64 },
    Stopped { summary: Option<ExperimentSummary> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayFrame {
    pub elapsed_secs: f64,
    /// Nodes contributing to the aggregate this tick.
    pub nodes: usize,
    pub figures: Vec<Figure>,
    pub experiment: ExperimentView,
}

impl DisplayFrame {
    pub fn figure(&self, key: &str) -> Option<&Figure> {
        self.figures.iter().find(|f| f.key == key)
    }
}
