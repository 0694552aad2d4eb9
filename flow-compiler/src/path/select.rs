//! Path selection over the topology graph
//!
//! Every selector is deterministic. Among paths that are equally good according to the selector's
//! metric, the one with fewer hops wins, and after that the lexicographically smallest sequence
//! of node ids. Unknown or disconnected endpoints yield `None`.

use crate::topology::{LinkAttributes, NodeId, Topology};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::time::Duration;

/// The path with the fewest hops between `src` and `dst`
pub fn fewest_hops(topology: &Topology, src: NodeId, dst: NodeId) -> Option<Vec<NodeId>> {
    fewest_hops_where(topology, src, dst, |_| true)
}

/// The path minimizing the sum of link delays between `src` and `dst`
pub fn min_latency(topology: &Topology, src: NodeId, dst: NodeId) -> Option<Vec<NodeId>> {
    if !topology.contains(src) || !topology.contains(dst) {
        return None;
    }

    // Dijkstra over full labels. The label order (delay, hops, path) is preserved when extending
    // a path by one link, so the first label settled for a node is the best one
    let mut settled = HashSet::new();
    let mut frontier = BinaryHeap::new();
    frontier.push(Reverse(LatencyLabel {
        delay: Duration::ZERO,
        hops: 0,
        path: vec![src],
    }));

    while let Some(Reverse(label)) = frontier.pop() {
        let Some(&node) = label.path.last() else {
            continue;
        };
        if !settled.insert(node) {
            continue;
        }
        if node == dst {
            return Some(label.path);
        }

        for (neighbor, link) in topology.neighbors(node) {
            if settled.contains(&neighbor) {
                continue;
            }

            let mut path = label.path.clone();
            path.push(neighbor);
            frontier.push(Reverse(LatencyLabel {
                delay: label.delay + link.delay,
                hops: label.hops + 1,
                path,
            }));
        }
    }

    None
}

/// The path maximizing the lowest link bandwidth between `src` and `dst`
pub fn max_bandwidth(topology: &Topology, src: NodeId, dst: NodeId) -> Option<Vec<NodeId>> {
    // The bottleneck metric alone cannot carry the tie-breaks through a single expansion (a
    // narrower prefix may still lead to the best path), so first find the best achievable
    // bottleneck and then pick the shortest path among the links that sustain it
    let bottleneck = widest_bottleneck_bps(topology, src, dst)?;
    fewest_hops_where(topology, src, dst, |link| link.bandwidth_bps >= bottleneck)
}

#[derive(PartialEq, Eq, PartialOrd, Ord)]
struct LatencyLabel {
    delay: Duration,
    hops: usize,
    path: Vec<NodeId>,
}

/// Breadth-first search restricted to the links accepted by `usable`
///
/// Neighbors are visited in ascending id order, so the first time a node is discovered it is
/// through the lexicographically smallest of its shortest paths.
fn fewest_hops_where(
    topology: &Topology,
    src: NodeId,
    dst: NodeId,
    usable: impl Fn(&LinkAttributes) -> bool,
) -> Option<Vec<NodeId>> {
    if !topology.contains(src) || !topology.contains(dst) {
        return None;
    }

    let mut parents = HashMap::new();
    let mut discovered = HashSet::from([src]);
    let mut queue = VecDeque::from([src]);
    while let Some(node) = queue.pop_front() {
        if node == dst {
            let mut path = vec![dst];
            let mut current = dst;
            while let Some(&parent) = parents.get(&current) {
                path.push(parent);
                current = parent;
            }
            path.reverse();
            return Some(path);
        }

        for (neighbor, link) in topology.neighbors(node) {
            if usable(link) && discovered.insert(neighbor) {
                parents.insert(neighbor, node);
                queue.push_back(neighbor);
            }
        }
    }

    None
}

/// Prim-style frontier expansion that always extends the node with the widest known bottleneck
fn widest_bottleneck_bps(topology: &Topology, src: NodeId, dst: NodeId) -> Option<u64> {
    if !topology.contains(src) || !topology.contains(dst) {
        return None;
    }

    let mut settled = HashSet::new();
    let mut frontier = BinaryHeap::from([(u64::MAX, Reverse(src))]);
    while let Some((bottleneck, Reverse(node))) = frontier.pop() {
        if !settled.insert(node) {
            continue;
        }
        if node == dst {
            return Some(bottleneck);
        }

        for (neighbor, link) in topology.neighbors(node) {
            if !settled.contains(&neighbor) {
                frontier.push((bottleneck.min(link.bandwidth_bps), Reverse(neighbor)));
            }
        }
    }

    None
}
