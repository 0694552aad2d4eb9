use crate::engine::{CompiledRules, EngineState, PolicyEngine, Priority};
use crate::error::PolicyError;
use crate::policy::{firewall_from_json, firewall_to_json};
use crate::registry::FlowTableSink;
use crate::rule::Rule;

/// A firewall policy, expressed directly as rules
///
/// Firewall rules take precedence over connectivity and traffic-engineering rules that match the
/// same traffic at the same switch.
pub struct FirewallEngine {
    policy: Vec<Rule>,
    compiled: CompiledRules,
}

impl FirewallEngine {
    pub fn new() -> Self {
        Self {
            policy: Vec::new(),
            compiled: CompiledRules::new(EngineState::Empty),
        }
    }

    pub fn add_rule(&mut self, rule: Rule) {
        self.policy.push(rule);
        self.compiled.objectives_changed();
    }

    /// Replaces the current policy with the one in the document
    ///
    /// The current policy is kept if the document is invalid.
    pub fn load_json(&mut self, json: &str) -> Result<(), PolicyError> {
        self.policy = firewall_from_json(json)?;
        tracing::debug!(rules = self.policy.len(), "loaded firewall policy");
        self.compiled.objectives_changed();
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, PolicyError> {
        firewall_to_json(&self.policy)
    }

    pub fn provision_firewall(&mut self, sink: &mut dyn FlowTableSink) -> Result<(), PolicyError> {
        self.provision(sink)
    }
}

impl Default for FirewallEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyEngine for FirewallEngine {
    fn name(&self) -> &'static str {
        "firewall"
    }

    fn priority(&self) -> Priority {
        Priority::FIREWALL
    }

    fn state(&self) -> EngineState {
        self.compiled.state
    }

    fn compile(&mut self) -> Result<&[Rule], PolicyError> {
        for rule in &self.policy {
            rule.action().validate()?;
        }

        let name = self.name();
        Ok(self.compiled.replace(name, self.policy.clone()))
    }

    fn rules(&self) -> &[Rule] {
        &self.compiled.rules
    }
}
