//! Shared topology fixtures for tests

use crate::models::{RawLink, TopologySnapshot};
use crate::topology::{RedundancyIndex, TopologyGraph};

/// `(link number, switch dpid, switch port, host index)`
const HOST_LINKS: &[(u32, i64, u32, i64)] = &[
    (1, 4, 1, 1), (2, 5, 1, 1), (3, 4, 2, 2), (4, 6, 1, 2),
    (5, 5, 2, 3), (6, 7, 1, 3), (7, 6, 2, 4), (8, 8, 1, 4),
    (9, 7, 2, 5), (10, 9, 1, 5), (11, 6, 3, 6), (12, 8, 2, 6),
    (13, 9, 2, 7), (14, 5, 3, 7), (15, 4, 3, 8), (16, 6, 4, 8),
    (17, 5, 4, 9), (18, 7, 3, 9), (19, 6, 5, 10), (20, 8, 3, 10),
    (21, 7, 4, 11), (22, 9, 3, 11), (23, 8, 4, 12), (24, 9, 4, 12),
];

/// `(link number, dpid a, port a, dpid b, port b)`
const SWITCH_LINKS: &[(u32, i64, u32, i64, u32)] = &[
    // core mesh
    (25, 1, 1, 2, 1), (26, 1, 2, 3, 1), (27, 2, 2, 3, 2),
    // core to aggregation
    (28, 1, 3, 4, 3), (29, 2, 3, 4, 4), (30, 1, 4, 5, 3), (31, 3, 3, 5, 4),
    (32, 2, 4, 6, 5), (33, 3, 4, 6, 6), (34, 1, 5, 7, 4), (35, 2, 5, 7, 5),
    (36, 1, 6, 8, 5), (37, 3, 5, 8, 6), (38, 2, 6, 9, 6), (39, 3, 6, 9, 7),
];

fn hw(dpid: i64, port: u32) -> String {
    format!("00:00:00:00:{:02x}:{:02x}", dpid.unsigned_abs(), port)
}

pub fn switch_link(dpid_a: i64, port_a: u32, dpid_b: i64, port_b: u32) -> RawLink {
    (dpid_a, port_a, hw(dpid_a, port_a), dpid_b, port_b, hw(dpid_b, port_b))
}

pub fn host_link(switch: i64, port: u32, host: i64) -> RawLink {
    (switch, port, hw(switch, port), -host, 1, hw(0, host as u32))
}

pub fn snapshot(entries: impl IntoIterator<Item = (String, RawLink)>) -> TopologySnapshot {
    TopologySnapshot {
        topology: entries.into_iter().collect(),
        total_links: None,
    }
}

/// Three core switches, six aggregation switches, twelve dual-homed hosts
pub fn backhaul_snapshot() -> TopologySnapshot {
    let hosts = HOST_LINKS
        .iter()
        .map(|&(n, switch, port, host)| (format!("link_{}", n), host_link(switch, port, host)));
    let switches = SWITCH_LINKS.iter().map(|&(n, a, pa, b, pb)| {
        (format!("link_{}", n), switch_link(a, pa, b, pb))
    });
    snapshot(hosts.chain(switches))
}

/// One host attached to one aggregation switch by two parallel links
pub fn dual_homed_snapshot() -> TopologySnapshot {
    snapshot([
        ("link_1".to_string(), host_link(4, 1, 1)),
        ("link_2".to_string(), host_link(4, 2, 1)),
    ])
}

pub fn backhaul() -> (TopologyGraph, RedundancyIndex) {
    let graph = TopologyGraph::build(&backhaul_snapshot()).expect("fixture topology is valid");
    let index = RedundancyIndex::compute(&graph);
    (graph, index)
}

pub fn dual_homed() -> (TopologyGraph, RedundancyIndex) {
    let graph = TopologyGraph::build(&dual_homed_snapshot()).expect("fixture topology is valid");
    let index = RedundancyIndex::compute(&graph);
    (graph, index)
}
