//! Runs several policy engines against the same set of switches

use crate::config::cli::EnginesOpt;
use crate::config::read_policy;
use anyhow::{Context, anyhow};
use flow_compiler::engine::{FirewallEngine, L2Engine, PolicyEngine, TeEngine};
use flow_compiler::registry::SwitchRegistry;
use flow_compiler::topology::Topology;
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;

pub type Engine = Box<dyn PolicyEngine + Send>;

pub fn load_engines(topology: &Arc<Topology>, options: &EnginesOpt) -> anyhow::Result<Vec<Engine>> {
    let mut engines: Vec<Engine> = Vec::new();
    if !options.no_l2 {
        engines.push(Box::new(L2Engine::new(topology.clone())));
    }

    if let Some(path) = &options.firewall {
        let mut engine = FirewallEngine::new();
        engine
            .load_json(&read_policy(path)?)
            .with_context(|| format!("invalid firewall policy at {}", path.display()))?;
        engines.push(Box::new(engine));
    }

    if let Some(path) = &options.te {
        let mut engine = TeEngine::new(topology.clone());
        engine
            .load_json(&read_policy(path)?)
            .with_context(|| format!("invalid traffic-engineering policy at {}", path.display()))?;
        engines.push(Box::new(engine));
    }

    Ok(engines)
}

/// Compiles every engine on its own thread, pushing the rules into the registry as soon as they
/// are ready
pub fn provision(engines: &mut [Engine], registry: &mut SwitchRegistry) -> anyhow::Result<()> {
    let registry = Mutex::new(registry);
    thread::scope(|s| {
        let handles: Vec<_> = engines
            .iter_mut()
            .map(|engine| {
                let registry = &registry;
                s.spawn(move || -> anyhow::Result<()> {
                    let name = engine.name();
                    engine
                        .compile()
                        .with_context(|| format!("failed to compile {name} rules"))?;

                    let mut registry = registry.lock();
                    engine.push(&mut **registry);
                    Ok(())
                })
            })
            .collect();

        handles.into_iter().try_for_each(|handle| {
            handle
                .join()
                .map_err(|_| anyhow!("engine thread panicked"))?
        })
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use flow_compiler::engine::Priority;
    use flow_compiler::topology::{LinkSpec, NodeSpec, TopologySpec};
    use std::time::Duration;

    fn line_topology() -> Arc<Topology> {
        let link = |source, target| LinkSpec {
            source,
            target,
            bandwidth_bps: 100_000_000,
            delay: Duration::from_millis(1),
        };
        let spec = TopologySpec {
            nodes: (1..=3).map(NodeSpec::new).collect(),
            links: vec![link(1, 2), link(2, 3)],
        };
        Arc::new(Topology::new(spec).unwrap())
    }

    #[test]
    fn test_provision_in_parallel() {
        let topology = line_topology();
        let mut registry = SwitchRegistry::new();
        for switch in topology.node_ids() {
            registry.register(switch);
        }

        let mut engines: Vec<Engine> = vec![
            Box::new(L2Engine::new(topology.clone())),
            Box::new(TeEngine::new(topology.clone())),
        ];
        provision(&mut engines, &mut registry).unwrap();

        // Local delivery plus one rule per other switch, on top of the table-miss entry
        for (_, table) in registry.tables() {
            assert_eq!(table.len(), 1 + 3);
            assert!(table.entries().all(|e| e.priority <= Priority::L2));
        }
    }
}
