//! Event scripts that drive a simulation.
//!
//! ```text
//! send N1 N2 3     # N1 sends 3 tokens to N2
//! snapshot N2      # N2 originates the next snapshot
//! tick 5           # advance five ticks
//! tick             # advance one tick
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use chandy_lamport_core::{ServerId, SnapshotId};

use crate::error::{Result, SimError};
use crate::simulator::Simulator;
use crate::snapshot::GlobalSnapshot;
use crate::topology::significant_lines;

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScriptEvent {
    /// Advance time.
    Tick { ticks: u64 },
    /// Transfer tokens between neighbors.
    Send {
        src: ServerId,
        dest: ServerId,
        amount: u64,
    },
    /// Originate a snapshot.
    Snapshot { server: ServerId },
}

/// An ordered list of actions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub events: Vec<ScriptEvent>,
}

impl Script {
    /// Parse the textual format.
    pub fn parse(text: &str) -> Result<Self> {
        let mut events = Vec::new();
        for (line_no, line) in significant_lines(text) {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let event = match fields.as_slice() {
                ["tick"] => ScriptEvent::Tick { ticks: 1 },
                ["tick", n] => ScriptEvent::Tick {
                    ticks: parse_number(line_no, n)?,
                },
                ["send", src, dest, amount] => ScriptEvent::Send {
                    src: ServerId::new(*src),
                    dest: ServerId::new(*dest),
                    amount: parse_number(line_no, amount)?,
                },
                ["snapshot", server] => ScriptEvent::Snapshot {
                    server: ServerId::new(*server),
                },
                _ => {
                    return Err(SimError::parse(line_no, format!("unrecognized event {:?}", line)))
                }
            };
            events.push(event);
        }
        Ok(Self { events })
    }

    /// Number of snapshots the script originates.
    pub fn snapshot_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, ScriptEvent::Snapshot { .. }))
            .count()
    }

    /// Apply every event in order. Returns the ids of started snapshots.
    pub fn run(&self, sim: &mut Simulator) -> Result<Vec<SnapshotId>> {
        let mut started = Vec::new();
        for event in &self.events {
            match event {
                ScriptEvent::Tick { ticks } => sim.run_ticks(*ticks)?,
                ScriptEvent::Send { src, dest, amount } => sim.send_tokens(src, dest, *amount)?,
                ScriptEvent::Snapshot { server } => started.push(sim.start_snapshot(server)?),
            }
        }
        Ok(started)
    }

    /// Run the script, then collect every snapshot it started.
    pub fn run_to_completion(&self, sim: &mut Simulator) -> Result<Vec<GlobalSnapshot>> {
        let started = self.run(sim)?;
        started
            .into_iter()
            .map(|snapshot_id| sim.collect_snapshot(snapshot_id))
            .collect()
    }
}

impl FromStr for Script {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_number(line: usize, field: &str) -> Result<u64> {
    field
        .parse()
        .map_err(|_| SimError::parse(line, format!("invalid number {:?}", field)))
}
