use crate::engine::{CompiledRules, EngineState, PolicyEngine, Priority};
use crate::error::PolicyError;
use crate::path::compile_path;
use crate::path::select::fewest_hops;
use crate::registry::FlowTableSink;
use crate::rule::{Action, MatchPattern, Rule};
use crate::topology::{HOST_PORT, Topology, mac_of};
use std::sync::Arc;

/// Full-mesh reachability between the hosts of all switches, based on destination MAC addresses
///
/// Every switch delivers traffic for its own host and, for every other host, forwards traffic to
/// the first hop of the shortest path towards it. The rest of the path follows from the rules of
/// the switches along the way.
pub struct L2Engine {
    topology: Arc<Topology>,
    compiled: CompiledRules,
}

impl L2Engine {
    pub fn new(topology: Arc<Topology>) -> Self {
        let state = if topology.node_ids().next().is_some() {
            EngineState::Loaded
        } else {
            EngineState::Empty
        };

        Self {
            topology,
            compiled: CompiledRules::new(state),
        }
    }

    pub fn provision_connectivity(&mut self, sink: &mut dyn FlowTableSink) -> Result<(), PolicyError> {
        self.provision(sink)
    }

    fn connectivity_rules(&self) -> Result<Vec<Rule>, PolicyError> {
        let topology = &self.topology;
        let to_host = |node| MatchPattern {
            dst_mac: Some(mac_of(node)),
            ..MatchPattern::default()
        };

        let mut rules: Vec<_> = topology
            .node_ids()
            .map(|node| Rule::new(node, to_host(node), Action::Forward(HOST_PORT)))
            .collect();

        for src in topology.node_ids() {
            for dst in topology.node_ids().filter(|&dst| dst != src) {
                let Some(path) = fewest_hops(topology, src, dst) else {
                    tracing::warn!(src, dst, "switches are not connected, skipping");
                    continue;
                };

                tracing::debug!(src, dst, ?path, "shortest path");
                let first_hop = compile_path(topology, &path, &to_host(dst), false)?
                    .into_iter()
                    .next();
                rules.extend(first_hop);
            }
        }

        Ok(rules)
    }
}

impl PolicyEngine for L2Engine {
    fn name(&self) -> &'static str {
        "l2"
    }

    fn priority(&self) -> Priority {
        Priority::L2
    }

    fn state(&self) -> EngineState {
        self.compiled.state
    }

    fn compile(&mut self) -> Result<&[Rule], PolicyError> {
        let name = self.name();
        let rules = self.connectivity_rules()?;
        Ok(self.compiled.replace(name, rules))
    }

    fn rules(&self) -> &[Rule] {
        &self.compiled.rules
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::registry::{SwitchRegistry, TraceOutcome};
    use crate::test_util::{isp_topology, link, tcp_packet, topology, udp_packet};

    #[test]
    fn test_connectivity_rules() {
        let topology = isp_topology();
        let mut engine = L2Engine::new(topology.clone());
        assert_eq!(engine.state(), EngineState::Loaded);

        let rules = engine.compile().unwrap();

        // One rule per host plus one per ordered pair of switches
        assert_eq!(rules.len(), 6 + 6 * 5);
        assert!(rules.iter().all(|r| r.match_pattern().in_port.is_none()));

        // Local delivery comes first
        for (rule, node) in rules.iter().zip(1..=6) {
            assert_eq!(rule.switch_id(), node);
            assert_eq!(rule.match_pattern().dst_mac, Some(mac_of(node)));
            assert_eq!(rule.action(), Action::Forward(HOST_PORT));
        }

        // Traffic from 1 to 6 leaves towards 2 (shortest path 1 -> 2 -> 3 -> 6)
        let rule = rules
            .iter()
            .find(|r| r.switch_id() == 1 && r.match_pattern().dst_mac == Some(mac_of(6)))
            .unwrap();
        assert_eq!(rule.action(), Action::Forward(topology.out_port(1, 2).unwrap()));
        assert_eq!(engine.state(), EngineState::Compiled);
    }

    #[test]
    fn test_every_host_reaches_every_host() {
        let topology = isp_topology();
        let mut registry = SwitchRegistry::new();
        for switch in topology.node_ids() {
            registry.register(switch);
        }

        let mut engine = L2Engine::new(topology.clone());
        engine.provision_connectivity(&mut registry).unwrap();

        for src in topology.node_ids() {
            for dst in topology.node_ids() {
                let trace = registry.trace(&topology, src, &udp_packet(src, dst, 80));
                assert_eq!(trace.outcome, TraceOutcome::Delivered(dst), "{src} -> {dst}");
                assert_eq!(trace.switches.first(), Some(&src));

                let trace = registry.trace(&topology, src, &tcp_packet(src, dst, 5050));
                assert_eq!(trace.outcome, TraceOutcome::Delivered(dst), "{src} -> {dst}");
            }
        }
    }

    #[test]
    fn test_compile_is_a_full_refresh() {
        let mut engine = L2Engine::new(isp_topology());
        let first = engine.compile().unwrap().to_vec();
        let second = engine.compile().unwrap().to_vec();
        assert_eq!(first, second);
    }

    #[test]
    fn test_disconnected_switches_only_get_local_rules() {
        let topology = Arc::new(topology(&[
            link().source(1).target(2).call(),
            link().source(3).target(4).call(),
        ]));
        let mut engine = L2Engine::new(topology);
        let rules = engine.compile().unwrap();
        assert_eq!(rules.len(), 4 + 4);
    }
}
