//! Textual topology descriptions.
//!
//! ```text
//! # three servers in a ring
//! 3
//! N1 10
//! N2 0
//! N3 0
//! N1 N2
//! N2 N3
//! N3 N1
//! ```
//!
//! The first line is the server count, followed by one `<id> <tokens>` line
//! per server, then any number of `<src> <dest>` links. Blank lines and
//! anything after `#` are ignored.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use chandy_lamport_core::{Server, ServerId};

use crate::config::SimulatorConfig;
use crate::error::{Result, SimError};
use crate::simulator::{link_servers, Simulator};

/// Servers with their initial tokens, and the links between them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    pub servers: Vec<(ServerId, u64)>,
    pub links: Vec<(ServerId, ServerId)>,
}

impl Topology {
    /// Create an empty topology.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a server.
    pub fn server(mut self, id: impl Into<ServerId>, tokens: u64) -> Self {
        self.servers.push((id.into(), tokens));
        self
    }

    /// Add a one-way link.
    pub fn link(mut self, src: impl Into<ServerId>, dest: impl Into<ServerId>) -> Self {
        self.links.push((src.into(), dest.into()));
        self
    }

    /// Add links in both directions.
    pub fn bidirectional(self, a: impl Into<ServerId>, b: impl Into<ServerId>) -> Self {
        let (a, b) = (a.into(), b.into());
        self.link(a.clone(), b.clone()).link(b, a)
    }

    /// Tokens across all servers. Fails if the total does not fit in a `u64`.
    pub fn total_tokens(&self) -> Result<u64> {
        self.servers.iter().try_fold(0u64, |total, (id, tokens)| {
            total
                .checked_add(*tokens)
                .ok_or_else(|| SimError::TokenOverflow(id.clone()))
        })
    }

    /// Whether every server can reach every other along links.
    ///
    /// Snapshots are only guaranteed to close everywhere on strongly
    /// connected topologies.
    pub fn is_strongly_connected(&self) -> bool {
        let Some((start, _)) = self.servers.first() else {
            return true;
        };
        let mut forward: BTreeMap<&ServerId, Vec<&ServerId>> = BTreeMap::new();
        let mut backward: BTreeMap<&ServerId, Vec<&ServerId>> = BTreeMap::new();
        for (src, dest) in &self.links {
            forward.entry(src).or_default().push(dest);
            backward.entry(dest).or_default().push(src);
        }
        let count = self.servers.len();
        reachable(start, &forward) == count && reachable(start, &backward) == count
    }

    /// Create the servers and wire their links, without a driver.
    pub fn build_servers(&self) -> Result<BTreeMap<ServerId, Server>> {
        self.total_tokens()?;
        let mut servers = BTreeMap::new();
        for (id, tokens) in &self.servers {
            if servers.contains_key(id) {
                return Err(SimError::DuplicateServer(id.clone()));
            }
            servers.insert(id.clone(), Server::new(id.clone(), *tokens));
        }
        for (src, dest) in &self.links {
            link_servers(&mut servers, src, dest)?;
        }
        Ok(servers)
    }

    /// Build a simulator from this topology.
    pub fn build(&self, config: SimulatorConfig) -> Result<Simulator> {
        let mut sim = Simulator::new(config);
        for (id, tokens) in &self.servers {
            sim.add_server(id.clone(), *tokens)?;
        }
        for (src, dest) in &self.links {
            sim.add_link(src, dest)?;
        }
        Ok(sim)
    }

    /// Parse the textual format.
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = significant_lines(text);

        let (line_no, first) = lines
            .next()
            .ok_or_else(|| SimError::parse(1, "missing server count"))?;
        let count: usize = first
            .parse()
            .map_err(|_| SimError::parse(line_no, format!("invalid server count {:?}", first)))?;

        let mut topology = Topology::new();
        for _ in 0..count {
            let (line_no, line) = lines
                .next()
                .ok_or_else(|| SimError::parse(line_no, format!("expected {} servers", count)))?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [id, tokens] = fields.as_slice() else {
                return Err(SimError::parse(line_no, "expected `<id> <tokens>`"));
            };
            let tokens = tokens
                .parse()
                .map_err(|_| SimError::parse(line_no, format!("invalid token count {:?}", tokens)))?;
            topology.servers.push((ServerId::new(*id), tokens));
        }

        for (line_no, line) in lines {
            let fields: Vec<&str> = line.split_whitespace().collect();
            let [src, dest] = fields.as_slice() else {
                return Err(SimError::parse(line_no, "expected `<src> <dest>`"));
            };
            topology.links.push((ServerId::new(*src), ServerId::new(*dest)));
        }
        topology.total_tokens()?;
        Ok(topology)
    }
}

impl FromStr for Topology {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn reachable(start: &ServerId, edges: &BTreeMap<&ServerId, Vec<&ServerId>>) -> usize {
    let mut seen = BTreeSet::from([start]);
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        for next in edges.get(node).into_iter().flatten() {
            if seen.insert(*next) {
                queue.push_back(*next);
            }
        }
    }
    seen.len()
}

/// Non-empty lines with comments stripped, numbered from 1.
pub(crate) fn significant_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines().enumerate().filter_map(|(i, line)| {
        let line = line.split('#').next().unwrap_or("").trim();
        (!line.is_empty()).then_some((i + 1, line))
    })
}
