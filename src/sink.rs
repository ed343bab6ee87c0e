// Output seams: the round-robin record sink and the live display render targets

use std::future::Future;
use std::io::Write;

use chrono::{DateTime, Utc};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::style::Print;
use crossterm::terminal::{Clear, ClearType};
use tokio::sync::broadcast;

use crate::error::TelemetryError;
use crate::models::{DisplayFrame, ExperimentView};

/// Fixed-schema, time-indexed record writer. Each writer owns its records; there is no
/// cross-task contention on a single record.
pub trait RecordSink: Send + Sync + 'static {
    fn append(
        &self,
        record: &str,
        at: DateTime<Utc>,
        values: &[f64],
    ) -> impl Future<Output = Result<(), TelemetryError>> + Send;
}

/// Consumes one display frame per aggregator tick. Rendering never feeds back into the core.
pub trait DisplaySink: Send + 'static {
    fn render(&mut self, frame: &DisplayFrame);
}

impl DisplaySink for Box<dyn DisplaySink> {
    fn render(&mut self, frame: &DisplayFrame) {
        self.as_mut().render(frame)
    }
}

/// Renders to every target in order.
impl<T: DisplaySink> DisplaySink for Vec<T> {
    fn render(&mut self, frame: &DisplayFrame) {
        for sink in self.iter_mut() {
            sink.render(frame);
        }
    }
}

/// Publishes frames to WebSocket subscribers. Having no subscribers is not an error.
pub struct BroadcastDisplay {
    tx: broadcast::Sender<DisplayFrame>,
}

impl BroadcastDisplay {
    pub fn new(tx: broadcast::Sender<DisplayFrame>) -> Self {
        Self { tx }
    }
}

impl DisplaySink for BroadcastDisplay {
    fn render(&mut self, frame: &DisplayFrame) {
        let _ = self.tx.send(frame.clone());
    }
}

/// Full-screen table on a terminal (clears and redraws every frame).
pub struct TerminalDisplay<W: Write + Send + 'static> {
    out: W,
}

impl TerminalDisplay<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self {
            out: std::io::stdout(),
        }
    }
}

impl<W: Write + Send + 'static> TerminalDisplay<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, frame: &DisplayFrame) -> std::io::Result<()> {
        // Raw mode disables newline translation, so every line is positioned explicitly.
        queue!(self.out, Clear(ClearType::All))?;
        for (row, line) in frame_lines(frame).iter().enumerate() {
            let row = u16::try_from(row).unwrap_or(u16::MAX);
            queue!(self.out, MoveTo(0, row), Print(line))?;
        }
        self.out.flush()
    }
}

fn frame_lines(frame: &DisplayFrame) -> Vec<String> {
    let mut lines = vec![
        format!(
            "Experiment duration - {:.0} sec ({} nodes)",
            frame.elapsed_secs, frame.nodes
        ),
        format!("{:>32}  {:>8}  {:>8}", "", "Overall", "Window"),
    ];
    for f in &frame.figures {
        lines.push(format!(
            "{:>32}  {:>8}  {:>8}",
            f.label,
            cell(f.overall),
            cell(f.window)
        ));
    }
    match &frame.experiment {
        ExperimentView::Idle => lines.push("Hit x to start a recording".into()),
        ExperimentView::Armed { remaining_secs } => lines.push(format!(
            "Experiment armed, waiting for the next round. Remaining time: {:.0} seconds",
            remaining_secs
        )),
        ExperimentView::Running { remaining_secs } => lines.push(format!(
            "Experiment running. Remaining time: {:.0} seconds",
            remaining_secs
        )),
        ExperimentView::Stopped { summary: None } => {
            lines.push("Experiment Result".into());
            lines.push("no data".into());
        }
        ExperimentView::Stopped {
            summary: Some(summary),
        } => {
            lines.push("Experiment Result".into());
            lines.push(format!("Time         {:>7.0}", summary.duration_secs));
            lines.push(format!(
                "Cfm Ltcy     {:>7}",
                cell(summary.confirmation_latency_secs)
            ));
            lines.push(format!("Thruput      {:>7}", cell(summary.throughput)));
            lines.push(format!("Prop Fork    {:>7}", cell(summary.proposer_fork_rate)));
            lines.push(format!("Vote Fork    {:>7}", cell(summary.voter_fork_rate)));
        }
    }
    lines
}

impl<W: Write + Send + 'static> DisplaySink for TerminalDisplay<W> {
    fn render(&mut self, frame: &DisplayFrame) {
        if let Err(e) = self.draw(frame) {
            tracing::debug!(error = %e, operation = "render_terminal", "terminal write failed");
        }
    }
}

fn cell(v: Option<f64>) -> String {
    match v {
        Some(v) if v.abs() >= 1000.0 || v == v.trunc() => format!("{:.0}", v),
        Some(v) => format!("{:.3}", v),
        None => "no data".into(),
    }
}
