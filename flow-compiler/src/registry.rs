//! Connected switches and their flow tables
//!
//! The registry stands in for the switches of a real deployment: engines push rules into it and
//! tests follow its flow tables hop by hop to check where packets end up.

use crate::engine::Priority;
use crate::rule::{Action, MatchPattern, PacketHeaders, Rule};
use crate::topology::{HOST_PORT, NodeId, PortNo, Topology};
use std::cmp::Reverse;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::{Display, Formatter};

/// The destination of compiled rules
pub trait FlowTableSink {
    /// Installs every rule with the given priority
    ///
    /// Installing a rule that is already present (same switch, priority and match) replaces it,
    /// so pushing the same rule set twice leaves the tables unchanged.
    fn install(&mut self, priority: Priority, rules: &[Rule]);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlowEntry {
    pub priority: Priority,
    pub match_pattern: MatchPattern,
    pub action: Action,
}

impl Display for FlowEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "priority={}", self.priority)?;
        if self.match_pattern != MatchPattern::any() {
            write!(f, ",{}", self.match_pattern.openflow())?;
        }

        match self.action {
            Action::Forward(port) => write!(f, " actions=output:{port}"),
            Action::Drop => write!(f, " actions=drop"),
            Action::Controller => write!(f, " actions=CONTROLLER"),
        }
    }
}

/// The flow table of a single switch
#[derive(Clone, Debug, Default)]
pub struct FlowTable {
    entries: BTreeMap<(Reverse<Priority>, MatchPattern), FlowEntry>,
}

impl FlowTable {
    fn insert(&mut self, priority: Priority, match_pattern: MatchPattern, action: Action) {
        let entry = FlowEntry {
            priority,
            match_pattern: match_pattern.clone(),
            action,
        };
        self.entries.insert((Reverse(priority), match_pattern), entry);
    }

    /// The entries of the table, highest priority first
    pub fn entries(&self) -> impl Iterator<Item = &FlowEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The highest-priority entry matching the packet
    pub fn lookup(&self, packet: &PacketHeaders) -> Option<&FlowEntry> {
        self.entries().find(|e| e.match_pattern.matches(packet))
    }
}

/// Where a traced packet ended up
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TraceOutcome {
    /// Handed to the host attached to the switch
    Delivered(NodeId),
    Dropped(NodeId),
    SentToController(NodeId),
    /// Sent out of a port that leads nowhere, or received by a switch that is not registered
    Lost { switch: NodeId, port: PortNo },
    /// Arrived at a switch through the same port twice
    Looped(NodeId),
}

impl Display for TraceOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceOutcome::Delivered(switch) => write!(f, "delivered to the host of switch {switch}"),
            TraceOutcome::Dropped(switch) => write!(f, "dropped by switch {switch}"),
            TraceOutcome::SentToController(switch) => {
                write!(f, "sent to the controller by switch {switch}")
            }
            TraceOutcome::Lost { switch, port } => {
                write!(f, "lost at port {port} of switch {switch}")
            }
            TraceOutcome::Looped(switch) => write!(f, "caught in a forwarding loop at switch {switch}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Trace {
    /// The switches the packet went through, starting with the ingress switch
    pub switches: Vec<NodeId>,
    pub outcome: TraceOutcome,
}

#[derive(Debug, Default)]
pub struct SwitchRegistry {
    switches: BTreeMap<NodeId, FlowTable>,
}

impl SwitchRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly connected switch, installing its table-miss entry
    ///
    /// Returns false if the switch was already registered (in which case nothing changes).
    pub fn register(&mut self, switch: NodeId) -> bool {
        if self.switches.contains_key(&switch) {
            return false;
        }

        let mut table = FlowTable::default();
        table.insert(Priority::TABLE_MISS, MatchPattern::any(), Action::Controller);
        self.switches.insert(switch, table);
        tracing::debug!(switch, "switch registered");
        true
    }

    /// Forgets a disconnected switch together with its flow table
    pub fn unregister(&mut self, switch: NodeId) -> bool {
        let removed = self.switches.remove(&switch).is_some();
        if removed {
            tracing::debug!(switch, "switch unregistered");
        }
        removed
    }

    pub fn is_registered(&self, switch: NodeId) -> bool {
        self.switches.contains_key(&switch)
    }

    /// The registered switches and their tables, by ascending switch id
    pub fn tables(&self) -> impl Iterator<Item = (NodeId, &FlowTable)> {
        self.switches.iter().map(|(&id, table)| (id, table))
    }

    pub fn table(&self, switch: NodeId) -> Option<&FlowTable> {
        self.switches.get(&switch)
    }

    /// Follows a packet sent by the host of `from_switch` through the flow tables
    pub fn trace(&self, topology: &Topology, from_switch: NodeId, packet: &PacketHeaders) -> Trace {
        let mut packet = packet.clone();
        packet.in_port = HOST_PORT;

        let mut switches = vec![from_switch];
        let mut seen = HashSet::new();
        let mut current = from_switch;
        let outcome = loop {
            if !seen.insert((current, packet.in_port)) {
                break TraceOutcome::Looped(current);
            }

            let Some(table) = self.switches.get(&current) else {
                break TraceOutcome::Lost {
                    switch: current,
                    port: packet.in_port,
                };
            };

            // Packets without a matching entry are dropped, as in OpenFlow 1.3
            let action = table.lookup(&packet).map_or(Action::Drop, |e| e.action);
            let port = match action {
                Action::Forward(HOST_PORT) => break TraceOutcome::Delivered(current),
                Action::Forward(port) => port,
                Action::Drop => break TraceOutcome::Dropped(current),
                Action::Controller => break TraceOutcome::SentToController(current),
            };

            let next = topology
                .neighbor_at_port(current, port)
                .and_then(|next| Some((next, topology.in_port(current, next)?)));
            let Some((next, in_port)) = next else {
                break TraceOutcome::Lost {
                    switch: current,
                    port,
                };
            };

            switches.push(next);
            packet.in_port = in_port;
            current = next;
        };

        Trace { switches, outcome }
    }
}

impl FlowTableSink for SwitchRegistry {
    fn install(&mut self, priority: Priority, rules: &[Rule]) {
        let mut installed = 0;
        let mut skipped = BTreeSet::new();
        for rule in rules {
            match self.switches.get_mut(&rule.switch_id()) {
                Some(table) => {
                    table.insert(priority, rule.match_pattern().clone(), rule.action());
                    installed += 1;
                }
                None => {
                    skipped.insert(rule.switch_id());
                }
            }
        }

        for switch in skipped {
            tracing::warn!(switch, "skipping rules for unregistered switch");
        }
        tracing::debug!(%priority, installed, "rules installed");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_util::{isp_topology, udp_packet};
    use crate::topology::mac_of;

    fn forward_to(switch: NodeId, dst: NodeId, port: PortNo) -> Rule {
        let pattern = MatchPattern {
            dst_mac: Some(mac_of(dst)),
            ..MatchPattern::default()
        };
        Rule::new(switch, pattern, Action::Forward(port))
    }

    #[test]
    fn test_register_installs_table_miss() {
        let mut registry = SwitchRegistry::new();
        assert!(registry.register(1));
        assert!(!registry.register(1));

        let table = registry.table(1).unwrap();
        assert_eq!(table.len(), 1);
        let entry = table.lookup(&udp_packet(1, 2, 80)).unwrap();
        assert_eq!(entry.priority, Priority::TABLE_MISS);
        assert_eq!(entry.action, Action::Controller);
        assert_eq!(entry.to_string(), "priority=0 actions=CONTROLLER");

        assert!(registry.unregister(1));
        assert!(!registry.unregister(1));
        assert!(registry.table(1).is_none());
    }

    #[test]
    fn test_install_is_idempotent() {
        let mut registry = SwitchRegistry::new();
        registry.register(1);
        let rules = [forward_to(1, 2, 2), forward_to(1, 4, 3)];

        registry.install(Priority::L2, &rules);
        registry.install(Priority::L2, &rules);
        let entries: Vec<_> = registry.table(1).unwrap().entries().cloned().collect();
        assert_eq!(entries.len(), 3);

        registry.install(Priority::L2, &rules);
        let again: Vec<_> = registry.table(1).unwrap().entries().cloned().collect();
        assert_eq!(again, entries);
    }

    #[test]
    fn test_install_skips_unregistered_switches() {
        let mut registry = SwitchRegistry::new();
        registry.register(1);
        registry.install(Priority::L2, &[forward_to(1, 2, 2), forward_to(2, 1, 2)]);

        assert_eq!(registry.table(1).unwrap().len(), 2);
        assert!(!registry.is_registered(2));
    }

    #[test]
    fn test_lookup_prefers_higher_priority() {
        let mut registry = SwitchRegistry::new();
        registry.register(1);
        registry.install(Priority::L2, &[forward_to(1, 2, 2)]);
        let drop = Rule::new(
            1,
            MatchPattern {
                dst_mac: Some(mac_of(2)),
                ..MatchPattern::default()
            },
            Action::Drop,
        );
        registry.install(Priority::FIREWALL, &[drop]);

        let table = registry.table(1).unwrap();
        let entry = table.lookup(&udp_packet(1, 2, 80)).unwrap();
        assert_eq!(entry.action, Action::Drop);
        assert_eq!(
            entry.to_string(),
            "priority=3,eth_dst=00:00:00:00:00:02,eth_type=0x0800 actions=drop"
        );

        let priorities: Vec<_> = table.entries().map(|e| e.priority).collect();
        assert_eq!(
            priorities,
            [Priority::FIREWALL, Priority::L2, Priority::TABLE_MISS]
        );
    }

    #[test]
    fn test_trace_outcomes() {
        let topology = isp_topology();
        let mut registry = SwitchRegistry::new();
        for switch in topology.node_ids() {
            registry.register(switch);
        }

        // Nothing installed yet: the first switch asks the controller
        let trace = registry.trace(&topology, 1, &udp_packet(1, 2, 80));
        assert_eq!(trace.outcome, TraceOutcome::SentToController(1));
        assert_eq!(trace.switches, [1]);

        // 1 -> 2 -> host
        registry.install(
            Priority::L2,
            &[forward_to(1, 2, 2), forward_to(2, 2, HOST_PORT)],
        );
        let trace = registry.trace(&topology, 1, &udp_packet(1, 2, 80));
        assert_eq!(trace.outcome, TraceOutcome::Delivered(2));
        assert_eq!(trace.switches, [1, 2]);

        // 2 sends traffic for 4 back to 1, which sends it back to 2
        registry.install(
            Priority::L2,
            &[forward_to(1, 4, 2), forward_to(2, 4, 2)],
        );
        let trace = registry.trace(&topology, 1, &udp_packet(1, 4, 80));
        assert_eq!(trace.outcome, TraceOutcome::Looped(2));
        assert_eq!(trace.switches, [1, 2, 1, 2]);

        // Port 9 of switch 1 is not connected
        registry.install(Priority::L2, &[forward_to(1, 5, 9)]);
        let trace = registry.trace(&topology, 1, &udp_packet(1, 5, 80));
        assert_eq!(trace.outcome, TraceOutcome::Lost { switch: 1, port: 9 });

        // Switch 3 is gone
        registry.unregister(3);
        registry.install(Priority::L2, &[forward_to(2, 3, 3), forward_to(1, 3, 2)]);
        let trace = registry.trace(&topology, 1, &udp_packet(1, 3, 80));
        assert_eq!(trace.switches, [1, 2, 3]);
        assert_eq!(trace.outcome, TraceOutcome::Lost { switch: 3, port: 2 });
    }
}
