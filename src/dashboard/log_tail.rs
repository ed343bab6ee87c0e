// Node log follower: turns delay, socket and poll-event lines into dashboard samples.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{Duration, sleep};

use super::{
    OUTQUEUE_EVENTS, POLL_EVENTS, PROPOSER_DELAY, READABLE_EVENTS, SOCKET_READ, SOCKET_WRITE,
    SeriesRegistry, TRANSACTION_DELAY, VOTER_DELAY, WRITABLE_EVENTS,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogEvent {
    /// Block propagation delay in ms.
    ProposerDelay(f64),
    VoterDelay(f64),
    TransactionDelay(f64),
    /// Bytes moved through a peer socket.
    SocketRead(f64),
    SocketWrite(f64),
    Poll,
    Readable,
    Writable,
    OutqueueReadable,
}

pub struct LogParser {
    proposer: Regex,
    voter: Regex,
    transaction: Regex,
    read: Regex,
    write: Regex,
    poll: Regex,
    readable: Regex,
    writable: Regex,
    outqueue: Regex,
}

impl LogParser {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            proposer: Regex::new(r"Received Proposer block, delay=(\d+) ms")?,
            voter: Regex::new(r"Received Voter block, delay=(\d+) ms")?,
            transaction: Regex::new(r"Received Transaction block, delay=(\d+) ms")?,
            read: Regex::new(r"Read (\d+) bytes from socket")?,
            write: Regex::new(r"Wrote (\d+) bytes to socket")?,
            poll: Regex::new(r"New polling results received")?,
            readable: Regex::new(r"Peer (\d+) readable")?,
            writable: Regex::new(r"Peer (\d+) writable")?,
            outqueue: Regex::new(r"Peer (\d+) outgoing queue readable")?,
        })
    }

    /// Delay and socket matches end the line; the event patterns are checked together.
    pub fn parse(&self, line: &str) -> Vec<LogEvent> {
        let exclusive: [(&Regex, fn(f64) -> LogEvent); 5] = [
            (&self.proposer, LogEvent::ProposerDelay),
            (&self.voter, LogEvent::VoterDelay),
            (&self.transaction, LogEvent::TransactionDelay),
            (&self.read, LogEvent::SocketRead),
            (&self.write, LogEvent::SocketWrite),
        ];
        for (re, event) in exclusive {
            if let Some(caps) = re.captures(line) {
                return match caps[1].parse::<f64>() {
                    Ok(v) => vec![event(v)],
                    Err(_) => Vec::new(),
                };
            }
        }

        let mut events = Vec::new();
        if self.poll.is_match(line) {
            events.push(LogEvent::Poll);
        }
        if self.readable.is_match(line) {
            events.push(LogEvent::Readable);
        }
        if self.writable.is_match(line) {
            events.push(LogEvent::Writable);
        }
        if self.outqueue.is_match(line) {
            events.push(LogEvent::OutqueueReadable);
        }
        events
    }
}

/// Parses log lines and records the scaled samples.
pub struct LogTracker {
    parser: LogParser,
    registry: SeriesRegistry,
    /// Consolidation interval of the socket/event series; samples are scaled to per-second.
    socket_interval_ms: u64,
}

impl LogTracker {
    pub fn new(registry: SeriesRegistry, socket_interval_ms: u64) -> Result<Self, regex::Error> {
        Ok(Self {
            parser: LogParser::new()?,
            registry,
            socket_interval_ms,
        })
    }

    fn per_second(&self) -> f64 {
        1000.0 / self.socket_interval_ms as f64
    }

    pub async fn ingest(&self, line: &str, at: DateTime<Utc>) {
        for event in self.parser.parse(line) {
            let (name, value) = match event {
                LogEvent::ProposerDelay(ms) => (PROPOSER_DELAY, ms),
                LogEvent::VoterDelay(ms) => (VOTER_DELAY, ms),
                LogEvent::TransactionDelay(ms) => (TRANSACTION_DELAY, ms),
                // kbit per second
                LogEvent::SocketRead(bytes) => {
                    (SOCKET_READ, bytes * 8.0 / 1000.0 * self.per_second())
                }
                LogEvent::SocketWrite(bytes) => {
                    (SOCKET_WRITE, bytes * 8.0 / 1000.0 * self.per_second())
                }
                LogEvent::Poll => (POLL_EVENTS, self.per_second()),
                LogEvent::Readable => (READABLE_EVENTS, self.per_second()),
                LogEvent::Writable => (WRITABLE_EVENTS, self.per_second()),
                LogEvent::OutqueueReadable => (OUTQUEUE_EVENTS, self.per_second()),
            };
            self.registry.record(name, value, at).await;
        }
    }
}

/// Follows `path` from its first line, waiting for the file to appear and for new lines.
/// Runs until the file can no longer be read.
pub async fn follow(path: PathBuf, tracker: LogTracker, poll: Duration) {
    let file = wait_for_file(&path, poll).await;
    tracing::info!(path = %path.display(), "following node log");
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    loop {
        match reader.read_line(&mut line).await {
            Ok(0) => {
                sleep(poll).await;
                continue;
            }
            Ok(_) if !line.ends_with('\n') => {
                // Partial line; the rest arrives with the next write.
                sleep(poll).await;
                continue;
            }
            Ok(_) => {
                tracker.ingest(line.trim_end(), Utc::now()).await;
                line.clear();
            }
            Err(e) => {
                tracing::warn!(error = %e, operation = "follow_log", path = %path.display(), "log follower stopped");
                return;
            }
        }
    }
}

async fn wait_for_file(path: &Path, poll: Duration) -> tokio::fs::File {
    let mut logged = false;
    loop {
        match tokio::fs::File::open(path).await {
            Ok(file) => return file,
            Err(e) => {
                if !logged {
                    tracing::info!(error = %e, path = %path.display(), "waiting for node log");
                    logged = true;
                }
                sleep(poll).await;
            }
        }
    }
}
