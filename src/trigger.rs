// Manual experiment trigger: an `x` keystroke arms the window.

use std::io::IsTerminal;
use std::ops::ControlFlow;

use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use futures::{Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub const ARM_KEY: char = 'x';

/// Why a key loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeysClosed {
    /// Ctrl-C. In raw mode it arrives as a key, not as SIGINT.
    Interrupt,
    /// Input ended or the aggregator is gone.
    Closed,
}

/// Forwards arm key presses from a terminal event stream. A trigger already waiting in the
/// channel absorbs repeats.
pub async fn forward_terminal_keys<S>(mut events: S, tx: mpsc::Sender<()>) -> KeysClosed
where
    S: Stream<Item = std::io::Result<Event>> + Unpin,
{
    while let Some(event) = events.next().await {
        let key = match event {
            Ok(Event::Key(key)) => key,
            Ok(_) => continue,
            Err(e) => {
                tracing::warn!(error = %e, operation = "read_trigger", "terminal input closed");
                return KeysClosed::Closed;
            }
        };
        if is_interrupt(&key) {
            return KeysClosed::Interrupt;
        }
        if key.kind == KeyEventKind::Press
            && key.code == KeyCode::Char(ARM_KEY)
            && send_arm(&tx).is_break()
        {
            return KeysClosed::Closed;
        }
    }
    KeysClosed::Closed
}

/// Byte-stream variant for non-terminal input such as a pipe. Returns on EOF or when the
/// aggregator is gone.
pub async fn forward_arm_keys<R: AsyncRead + Unpin>(mut reader: R, tx: mpsc::Sender<()>) {
    let mut buf = [0u8; 64];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if buf[..n].contains(&(ARM_KEY as u8)) && send_arm(&tx).is_break() {
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, operation = "read_trigger", "trigger input closed");
                break;
            }
        }
    }
}

fn is_interrupt(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
}

fn send_arm(tx: &mpsc::Sender<()>) -> ControlFlow<()> {
    match tx.try_send(()) {
        Ok(()) => tracing::info!("experiment start requested"),
        Err(mpsc::error::TrySendError::Full(())) => {
            tracing::debug!("experiment start already pending")
        }
        Err(mpsc::error::TrySendError::Closed(())) => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}

/// Terminal in raw mode so single keys arrive unbuffered and unechoed. Restored on drop and
/// on panic.
pub struct RawTerminal {
    _private: (),
}

impl RawTerminal {
    pub fn enable() -> std::io::Result<Self> {
        enable_raw_mode()?;
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let _ = disable_raw_mode();
            original(info);
        }));
        Ok(Self { _private: () })
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            tracing::warn!(error = %e, operation = "restore_terminal", "terminal mode not restored");
        }
    }
}

/// Running trigger input. Hold it for the life of the process: dropping it restores the
/// terminal.
pub struct TriggerInput {
    pub task: JoinHandle<KeysClosed>,
    pub raw: Option<RawTerminal>,
}

/// Reads arm keys from the terminal when stdin is one, otherwise from stdin as bytes.
pub fn spawn_trigger_input(tx: mpsc::Sender<()>) -> std::io::Result<TriggerInput> {
    if std::io::stdin().is_terminal() {
        let raw = RawTerminal::enable()?;
        let task = tokio::spawn(forward_terminal_keys(EventStream::new(), tx));
        return Ok(TriggerInput {
            task,
            raw: Some(raw),
        });
    }
    let task = tokio::spawn(async move {
        forward_arm_keys(tokio::io::stdin(), tx).await;
        KeysClosed::Closed
    });
    Ok(TriggerInput { task, raw: None })
}
