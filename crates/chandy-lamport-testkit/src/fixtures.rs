//! Test fixtures and helpers.
//!
//! Common topologies for integration tests. Servers are named `N1`, `N2`, …

use chandy_lamport_core::ServerId;
use chandy_lamport_sim::Topology;

/// Name of the `index`-th server (zero based).
pub fn server_name(index: usize) -> ServerId {
    ServerId::new(format!("N{}", index + 1))
}

/// `n` servers linked one way in a ring, `N1 -> N2 -> … -> N1`.
/// `N1` holds all `tokens`.
pub fn ring(n: usize, tokens: u64) -> Topology {
    let mut topology = Topology::new();
    for i in 0..n {
        topology = topology.server(server_name(i), if i == 0 { tokens } else { 0 });
    }
    if n > 1 {
        for i in 0..n {
            topology = topology.link(server_name(i), server_name((i + 1) % n));
        }
    }
    topology
}

/// `n` servers with links in both directions between every pair, each
/// holding `tokens`.
pub fn complete(n: usize, tokens: u64) -> Topology {
    let mut topology = Topology::new();
    for i in 0..n {
        topology = topology.server(server_name(i), tokens);
    }
    for i in 0..n {
        for j in (i + 1)..n {
            topology = topology.bidirectional(server_name(i), server_name(j));
        }
    }
    topology
}
