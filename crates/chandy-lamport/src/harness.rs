//! Running a scenario end to end.
//!
//! A scenario is a topology and a script. The harness runs it on either
//! driver, collects every snapshot the script starts and checks each one
//! accounts for all tokens.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::Context;

use chandy_lamport_actor::{ActorConfig, Coordinator};
use chandy_lamport_core::ServerId;
use chandy_lamport_sim::{EventLogger, GlobalSnapshot, Script, SimulatorConfig, Topology};

use crate::error::{Error, Result};

/// Which driver runs the scenario.
#[derive(Debug, Clone)]
pub enum Driver {
    /// The deterministic discrete-event simulator.
    Simulator(SimulatorConfig),
    /// One tokio task per server.
    Actors(ActorConfig),
}

impl Default for Driver {
    fn default() -> Self {
        Driver::Simulator(SimulatorConfig::default())
    }
}

/// Outcome of a scenario run.
#[derive(Debug)]
pub struct Report {
    /// Collected snapshots, in start order.
    pub snapshots: Vec<GlobalSnapshot>,
    /// Tokens in the topology at the start.
    pub expected_tokens: u64,
    /// Token count per server once the network drained.
    pub final_tokens: BTreeMap<ServerId, u64>,
    /// Audit log, for simulated runs.
    pub log: Option<EventLogger>,
}

impl Report {
    /// Check every snapshot and the final state against the starting total.
    pub fn verify(&self) -> Result<()> {
        for snapshot in &self.snapshots {
            snapshot.verify_conservation(self.expected_tokens)?;
        }
        let actual: u64 = self.final_tokens.values().sum();
        if actual != self.expected_tokens {
            return Err(Error::TokensNotConserved {
                expected: self.expected_tokens,
                actual,
            });
        }
        Ok(())
    }

    /// Write the audit log as JSON lines. Does nothing for actor runs.
    pub fn export_log(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let Some(log) = &self.log else {
            return Ok(());
        };
        let path = path.as_ref();
        let file =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        log.write_json_lines(BufWriter::new(file))
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

/// A topology and the script to run against it.
#[derive(Debug, Clone)]
pub struct Harness {
    topology: Topology,
    script: Script,
}

impl Harness {
    /// Create a harness.
    pub fn new(topology: Topology, script: Script) -> Self {
        Self { topology, script }
    }

    /// Parse both text formats.
    pub fn parse(topology: &str, script: &str) -> Result<Self> {
        Ok(Self::new(topology.parse()?, script.parse()?))
    }

    /// Load both text formats from disk.
    pub fn from_files(topology: impl AsRef<Path>, script: impl AsRef<Path>) -> anyhow::Result<Self> {
        let (topology, script) = (topology.as_ref(), script.as_ref());
        let topology_text = std::fs::read_to_string(topology)
            .with_context(|| format!("reading topology {}", topology.display()))?;
        let script_text = std::fs::read_to_string(script)
            .with_context(|| format!("reading script {}", script.display()))?;

        let topology = Topology::parse(&topology_text)
            .with_context(|| format!("parsing topology {}", topology.display()))?;
        let script = Script::parse(&script_text)
            .with_context(|| format!("parsing script {}", script.display()))?;
        Ok(Self::new(topology, script))
    }

    /// The topology.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// The script.
    pub fn script(&self) -> &Script {
        &self.script
    }

    /// Run on `driver`.
    pub async fn run(&self, driver: &Driver) -> Result<Report> {
        match driver {
            Driver::Simulator(config) => self.run_simulated(config.clone()),
            Driver::Actors(config) => self.run_actors(config.clone()).await,
        }
    }

    /// Run on the simulator.
    pub fn run_simulated(&self, config: SimulatorConfig) -> Result<Report> {
        if !self.topology.is_strongly_connected() {
            tracing::warn!("topology is not strongly connected; snapshots may not close");
        }
        let expected_tokens = self.topology.total_tokens()?;
        let mut sim = self.topology.build(config)?;
        let snapshots = self.script.run_to_completion(&mut sim)?;
        let ticks = sim.run_until_idle()?;
        tracing::debug!(tick = sim.time(), drained_in = ticks, "simulation finished");

        let final_tokens = sim
            .servers()
            .map(|server| (server.id().clone(), server.tokens()))
            .collect();
        Ok(Report {
            snapshots,
            expected_tokens,
            final_tokens,
            log: Some(sim.logger().clone()),
        })
    }

    /// Run with one task per server.
    pub async fn run_actors(&self, config: ActorConfig) -> Result<Report> {
        let expected_tokens = self.topology.total_tokens()?;
        let mut coordinator = Coordinator::spawn(&self.topology, config).await?;
        let snapshots = coordinator.run_script(&self.script).await?;
        let servers = coordinator.shutdown().await?;

        let final_tokens = servers
            .iter()
            .map(|server| (server.id().clone(), server.tokens()))
            .collect();
        Ok(Report {
            snapshots,
            expected_tokens,
            final_tokens,
            log: None,
        })
    }
}
