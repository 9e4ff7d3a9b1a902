//! Audit log of a simulation run.
//!
//! The logger groups events by tick ("epoch"). It is separate from `tracing`
//! output: the log is data that tests compare and that can be exported for
//! replay.

use std::fmt::Write as _;
use std::io::Write;

use serde::{Deserialize, Serialize};

use chandy_lamport_core::{Message, ServerId, SnapshotId, Tick};

use crate::error::Result;

/// One logged event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogEvent {
    /// A server queued a message on a link.
    Sent {
        src: ServerId,
        dest: ServerId,
        message: Message,
    },
    /// The driver delivered a message.
    Received {
        src: ServerId,
        dest: ServerId,
        message: Message,
    },
    /// The driver seeded a snapshot on a server.
    StartSnapshot {
        server: ServerId,
        snapshot_id: SnapshotId,
    },
    /// A server closed its record for a snapshot.
    EndSnapshot {
        server: ServerId,
        snapshot_id: SnapshotId,
    },
}

/// A logged event with the tick it happened in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub tick: Tick,
    #[serde(flatten)]
    pub event: LogEvent,
}

/// Per-tick event log.
#[derive(Debug, Clone, Default)]
pub struct EventLogger {
    /// `epochs[t]` holds the events recorded during tick `t`.
    epochs: Vec<Vec<LogEvent>>,
}

impl EventLogger {
    /// Create a logger positioned at tick 0.
    pub fn new() -> Self {
        Self {
            epochs: vec![Vec::new()],
        }
    }

    /// Start recording into the next tick.
    pub fn new_epoch(&mut self) {
        self.epochs.push(Vec::new());
    }

    /// Record an event in the current tick.
    pub fn record(&mut self, event: LogEvent) {
        if self.epochs.is_empty() {
            self.epochs.push(Vec::new());
        }
        if let Some(epoch) = self.epochs.last_mut() {
            epoch.push(event);
        }
    }

    /// Events recorded during `tick`.
    pub fn epoch(&self, tick: Tick) -> &[LogEvent] {
        usize::try_from(tick)
            .ok()
            .and_then(|t| self.epochs.get(t))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All events in order, with their tick.
    pub fn entries(&self) -> impl Iterator<Item = LogEntry> + '_ {
        self.epochs.iter().enumerate().flat_map(|(tick, events)| {
            events.iter().map(move |event| LogEntry {
                tick: tick as Tick,
                event: event.clone(),
            })
        })
    }

    /// Total number of recorded events.
    pub fn len(&self) -> usize {
        self.epochs.iter().map(Vec::len).sum()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write one JSON object per line.
    pub fn write_json_lines<W: Write>(&self, mut out: W) -> Result<()> {
        for entry in self.entries() {
            serde_json::to_writer(&mut out, &entry)?;
            out.write_all(b"\n")?;
        }
        out.flush()?;
        Ok(())
    }

    /// Human-readable dump, one block per non-empty tick.
    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        for (tick, events) in self.epochs.iter().enumerate() {
            if events.is_empty() {
                continue;
            }
            let _ = writeln!(out, "Time {}:", tick);
            for event in events {
                let _ = writeln!(out, "  {}", describe(event));
            }
        }
        out
    }
}

fn describe(event: &LogEvent) -> String {
    match event {
        LogEvent::Sent { src, dest, message } => {
            format!("{} sent {} to {}", src, describe_message(message), dest)
        }
        LogEvent::Received { src, dest, message } => {
            format!("{} received {} from {}", dest, describe_message(message), src)
        }
        LogEvent::StartSnapshot {
            server,
            snapshot_id,
        } => format!("{} startSnapshot({})", server, snapshot_id),
        LogEvent::EndSnapshot {
            server,
            snapshot_id,
        } => format!("{} endSnapshot({})", server, snapshot_id),
    }
}

fn describe_message(message: &Message) -> String {
    match message {
        Message::Marker { snapshot_id } => format!("marker({})", snapshot_id),
        Message::Token { amount } => format!("token({})", amount),
    }
}
