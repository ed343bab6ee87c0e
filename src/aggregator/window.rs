// Experiment window state machine. `transition` is the only way to change phase.

use crate::models::{ExperimentSummary, ExperimentView, PerfVector};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ExperimentWindow {
    #[default]
    Idle,
    /// Waiting for the reference counter to move.
    Armed { deadline_secs: f64 },
    /// `stop` is the latest boundary observed so far; it keeps moving until the timeout.
    Running {
        deadline_secs: f64,
        start: PerfVector,
        stop: Option<PerfVector>,
    },
    /// Terminal. `None` means the window never produced two boundaries ("no data").
    Stopped { summary: Option<ExperimentSummary> },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WindowEvent {
    /// Operator trigger at tick time `now_secs`.
    Arm { now_secs: f64, timeout_secs: f64 },
    Timeout,
    /// Reference node counters at the previous and at this tick.
    Observe {
        previous: PerfVector,
        current: PerfVector,
    },
}

impl ExperimentWindow {
    pub fn transition(self, event: WindowEvent) -> Self {
        use ExperimentWindow::*;
        match (self, event) {
            (Idle, WindowEvent::Arm { now_secs, timeout_secs }) => Armed {
                deadline_secs: now_secs + timeout_secs,
            },
            (Stopped { summary }, _) => Stopped { summary },
            (Running { start, stop, .. }, WindowEvent::Timeout) => Stopped {
                summary: stop.and_then(|stop| ExperimentSummary::between(&start, &stop)),
            },
            (_, WindowEvent::Timeout) => Stopped { summary: None },
            (Armed { deadline_secs }, WindowEvent::Observe { previous, current })
                if previous.confirmed_tx != current.confirmed_tx =>
            {
                Running {
                    deadline_secs,
                    // Start at the first changed value: throughput counts the increments after it.
                    start: current,
                    stop: None,
                }
            }
            (
                Running {
                    deadline_secs,
                    start,
                    ..
                },
                WindowEvent::Observe { previous, current },
            ) if previous.confirmed_tx != current.confirmed_tx => Running {
                deadline_secs,
                start,
                stop: Some(current),
            },
            (state, _) => state,
        }
    }

    pub fn deadline_secs(&self) -> Option<f64> {
        match self {
            Self::Armed { deadline_secs } | Self::Running { deadline_secs, .. } => {
                Some(*deadline_secs)
            }
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped { .. })
    }

    pub fn view(&self, now_secs: f64) -> ExperimentView {
        match self {
            Self::Idle => ExperimentView::Idle,
            Self::Armed { deadline_secs } => ExperimentView::Armed {
                remaining_secs: (deadline_secs - now_secs).max(0.0),
            },
            Self::Running { deadline_secs, .. } => ExperimentView::Running {
                remaining_secs: (deadline_secs - now_secs).max(0.0),
            },
            Self::Stopped { summary } => ExperimentView::Stopped { summary: *summary },
        }
    }
}
