//! Read-only switch topology
//!
//! Every node is a switch with a single host attached to port 1. The remaining ports of a switch
//! are numbered from 2 upwards, following the ascending ids of its switch neighbors. Each switch
//! numbers its ports independently, so the two ends of a link usually use different port numbers.

mod address;
pub mod ip;
mod spec;

pub use address::{MacAddr, ip_of, mac_of};
pub use spec::{LinkSpec, NodeSpec, ServerProtocol, ServerSpec, TopologySpec};

use crate::error::PolicyError;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::Duration;

pub type NodeId = u32;
pub type PortNo = u32;

/// The switch port connected to the switch's own host
pub const HOST_PORT: PortNo = 1;
/// The port assigned to the lowest-id neighbor of a switch
pub const FIRST_SWITCH_PORT: PortNo = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinkAttributes {
    pub bandwidth_bps: u64,
    pub delay: Duration,
}

#[derive(Debug)]
pub struct Topology {
    nodes: BTreeMap<NodeId, NodeSpec>,
    /// Neighbors of each node, ordered by id (the order determines port numbers)
    adjacency: BTreeMap<NodeId, BTreeMap<NodeId, LinkAttributes>>,
}

impl Topology {
    pub fn new(spec: TopologySpec) -> Result<Self, PolicyError> {
        let mut nodes: BTreeMap<NodeId, NodeSpec> = BTreeMap::new();
        let mut adjacency: BTreeMap<NodeId, BTreeMap<NodeId, LinkAttributes>> = BTreeMap::new();
        for node in spec.nodes {
            if node.id == 0 {
                return Err(invalid("node ids must be positive".to_string()));
            }

            let id = node.id;
            if nodes.insert(id, node).is_some() {
                return Err(invalid(format!("node `{id}` is defined more than once")));
            }
            adjacency.insert(id, BTreeMap::new());
        }

        for link in spec.links {
            let (source, target) = (link.source, link.target);
            for endpoint in [source, target] {
                if !nodes.contains_key(&endpoint) {
                    return Err(invalid(format!(
                        "link {source}-{target} references unknown node `{endpoint}`"
                    )));
                }
            }
            if source == target {
                return Err(invalid(format!("node `{source}` is linked to itself")));
            }
            if link.bandwidth_bps == 0 {
                return Err(invalid(format!("link {source}-{target} has no bandwidth")));
            }

            let attributes = LinkAttributes {
                bandwidth_bps: link.bandwidth_bps,
                delay: link.delay,
            };
            let duplicate = adjacency
                .get_mut(&source)
                .and_then(|neighbors| neighbors.insert(target, attributes))
                .is_some();
            if duplicate {
                return Err(invalid(format!(
                    "link {source}-{target} is defined more than once"
                )));
            }
            if let Some(neighbors) = adjacency.get_mut(&target) {
                neighbors.insert(source, attributes);
            }
        }

        Ok(Self { nodes, adjacency })
    }

    /// All node ids, in ascending order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeSpec> {
        self.nodes.values()
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeSpec> {
        self.nodes.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// The neighbors of `id`, in ascending id order (empty for unknown nodes)
    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = (NodeId, &LinkAttributes)> {
        self.adjacency
            .get(&id)
            .into_iter()
            .flat_map(|neighbors| neighbors.iter().map(|(&n, link)| (n, link)))
    }

    pub fn link(&self, a: NodeId, b: NodeId) -> Option<&LinkAttributes> {
        self.adjacency.get(&a)?.get(&b)
    }

    pub fn are_adjacent(&self, a: NodeId, b: NodeId) -> bool {
        self.link(a, b).is_some()
    }

    /// Every link once, as `(lower id, higher id, attributes)`, in ascending order
    pub fn links(&self) -> impl Iterator<Item = (NodeId, NodeId, &LinkAttributes)> {
        self.adjacency.iter().flat_map(|(&a, neighbors)| {
            neighbors
                .range((Bound::Excluded(a), Bound::Unbounded))
                .map(move |(&b, link)| (a, b, link))
        })
    }

    /// The port at `src` that leads to `dst`, if they are neighbors
    pub fn out_port(&self, src: NodeId, dst: NodeId) -> Option<PortNo> {
        let offset = self.adjacency.get(&src)?.keys().position(|&n| n == dst)?;
        Some(FIRST_SWITCH_PORT + offset as PortNo)
    }

    /// The port at `dst` through which traffic from `src` arrives, if they are neighbors
    pub fn in_port(&self, src: NodeId, dst: NodeId) -> Option<PortNo> {
        let offset = self.adjacency.get(&dst)?.keys().position(|&n| n == src)?;
        Some(FIRST_SWITCH_PORT + offset as PortNo)
    }

    /// The neighbor reached through `port` of `switch` (the inverse of [`Topology::out_port`])
    pub fn neighbor_at_port(&self, switch: NodeId, port: PortNo) -> Option<NodeId> {
        let offset = port.checked_sub(FIRST_SWITCH_PORT)?;
        self.adjacency
            .get(&switch)?
            .keys()
            .nth(offset as usize)
            .copied()
    }

    /// The ports used at each end of the link between `a` and `b`
    pub fn link_ports(&self, a: NodeId, b: NodeId) -> Option<(PortNo, PortNo)> {
        Some((self.out_port(a, b)?, self.in_port(a, b)?))
    }

    /// The sum of link delays along `path`, or `None` if it takes a non-existing link
    pub fn path_delay(&self, path: &[NodeId]) -> Option<Duration> {
        path.windows(2)
            .map(|pair| self.link(pair[0], pair[1]).map(|l| l.delay))
            .sum()
    }

    /// The lowest link bandwidth along `path`, or `None` if it takes a non-existing link or has
    /// no links at all
    pub fn path_bottleneck_bps(&self, path: &[NodeId]) -> Option<u64> {
        let bandwidths: Option<Vec<_>> = path
            .windows(2)
            .map(|pair| self.link(pair[0], pair[1]).map(|l| l.bandwidth_bps))
            .collect();
        bandwidths?.into_iter().min()
    }
}

fn invalid(reason: String) -> PolicyError {
    PolicyError::InvalidTopology(reason)
}
