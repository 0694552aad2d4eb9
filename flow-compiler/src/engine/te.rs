use crate::engine::{CompiledRules, EngineState, PolicyEngine, Priority};
use crate::error::PolicyError;
use crate::objective::{EndpointObjective, Objective, PassByPathObjective, TeObjectives};
use crate::path::compile_path;
use crate::path::select;
use crate::policy::{te_from_json, te_to_json};
use crate::registry::FlowTableSink;
use crate::rule::Rule;
use crate::topology::{NodeId, Topology};
use std::sync::Arc;

type Selector = fn(&Topology, NodeId, NodeId) -> Option<Vec<NodeId>>;

/// Traffic engineering: steers matching traffic along explicit or optimized paths
///
/// Every switch along a path gets a rule that also matches the port through which the traffic
/// arrives, so that flows sharing a switch in opposite directions do not clash.
pub struct TeEngine {
    topology: Arc<Topology>,
    objectives: TeObjectives,
    compiled: CompiledRules,
}

impl TeEngine {
    pub fn new(topology: Arc<Topology>) -> Self {
        Self {
            topology,
            objectives: TeObjectives::default(),
            compiled: CompiledRules::new(EngineState::Empty),
        }
    }

    pub fn objectives(&self) -> &TeObjectives {
        &self.objectives
    }

    pub fn add_objective(&mut self, objective: Objective) {
        self.objectives.push(objective);
        self.compiled.objectives_changed();
    }

    pub fn add_pass_by_path(&mut self, objective: PassByPathObjective) {
        self.add_objective(Objective::PassByPath(objective));
    }

    pub fn add_min_latency(&mut self, objective: EndpointObjective) {
        self.add_objective(Objective::MinLatency(objective));
    }

    pub fn add_max_bandwidth(&mut self, objective: EndpointObjective) {
        self.add_objective(Objective::MaxBandwidth(objective));
    }

    /// Replaces the current objectives with the ones in the document
    ///
    /// The current objectives are kept if the document is invalid.
    pub fn load_json(&mut self, json: &str) -> Result<(), PolicyError> {
        self.objectives = te_from_json(json)?;
        tracing::debug!(
            objectives = self.objectives.len(),
            "loaded traffic engineering policy"
        );
        self.compiled.objectives_changed();
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, PolicyError> {
        te_to_json(&self.objectives)
    }

    /// Provisions the pass-by-path objectives only, replacing any previously compiled rules
    ///
    /// The engine stays out of date until every objective is compiled again.
    pub fn provision_pass_by_paths(&mut self, sink: &mut dyn FlowTableSink) -> Result<(), PolicyError> {
        let objectives = self.objectives.pass_by_paths.iter().cloned();
        self.provision_objectives(sink, objectives.map(Objective::PassByPath).collect())
    }

    /// Provisions the min-latency objectives only, replacing any previously compiled rules
    ///
    /// The engine stays out of date until every objective is compiled again.
    pub fn provision_min_latency_paths(
        &mut self,
        sink: &mut dyn FlowTableSink,
    ) -> Result<(), PolicyError> {
        let objectives = self.objectives.min_latency.iter().cloned();
        self.provision_objectives(sink, objectives.map(Objective::MinLatency).collect())
    }

    /// Provisions the max-bandwidth objectives only, replacing any previously compiled rules
    ///
    /// The engine stays out of date until every objective is compiled again.
    pub fn provision_max_bandwidth_paths(
        &mut self,
        sink: &mut dyn FlowTableSink,
    ) -> Result<(), PolicyError> {
        let objectives = self.objectives.max_bandwidth.iter().cloned();
        self.provision_objectives(sink, objectives.map(Objective::MaxBandwidth).collect())
    }

    /// Provisions every objective, in a single push
    pub fn provision_all(&mut self, sink: &mut dyn FlowTableSink) -> Result<(), PolicyError> {
        self.provision(sink)
    }

    fn provision_objectives(
        &mut self,
        sink: &mut dyn FlowTableSink,
        objectives: Vec<Objective>,
    ) -> Result<(), PolicyError> {
        let name = self.name();
        let rules = self.compile_objectives(&objectives)?;
        self.compiled.replace_partial(name, rules);
        self.push(sink);
        Ok(())
    }

    fn compile_objectives(&self, objectives: &[Objective]) -> Result<Vec<Rule>, PolicyError> {
        let mut rules = Vec::new();
        for objective in objectives {
            let path = self.select_path(objective)?;
            tracing::debug!(
                objective = objective.kind(),
                ?path,
                delay = ?self.topology.path_delay(&path),
                bottleneck_bps = self.topology.path_bottleneck_bps(&path),
                symmetric = objective.symmetric(),
                "selected path"
            );

            let pattern = objective.match_pattern();
            rules.extend(compile_path(&self.topology, &path, pattern, true)?);

            if objective.symmetric() {
                let reversed: Vec<_> = path.iter().rev().copied().collect();
                rules.extend(compile_path(
                    &self.topology,
                    &reversed,
                    &pattern.reversed(),
                    true,
                )?);
            }
        }

        Ok(rules)
    }

    fn select_path(&self, objective: &Objective) -> Result<Vec<NodeId>, PolicyError> {
        let (selector, endpoints): (Selector, _) = match objective {
            Objective::PassByPath(o) => return Ok(o.switches.clone()),
            Objective::MinLatency(o) => (select::min_latency, o),
            Objective::MaxBandwidth(o) => (select::max_bandwidth, o),
        };

        let (src, dst) = (endpoints.src_switch, endpoints.dst_switch);
        selector(&self.topology, src, dst).ok_or(PolicyError::UnreachableObjective { src, dst })
    }
}

impl PolicyEngine for TeEngine {
    fn name(&self) -> &'static str {
        "te"
    }

    fn priority(&self) -> Priority {
        Priority::TE
    }

    fn state(&self) -> EngineState {
        self.compiled.state
    }

    fn compile(&mut self) -> Result<&[Rule], PolicyError> {
        let name = self.name();
        let objectives: Vec<_> = self.objectives.iter().collect();
        let rules = self.compile_objectives(&objectives)?;
        Ok(self.compiled.replace(name, rules))
    }

    fn rules(&self) -> &[Rule] {
        &self.compiled.rules
    }
}
