//! Policy engines
//!
//! Each engine turns one kind of network intent into a full set of rules. Compiling always starts
//! from scratch, so the compiled rules reflect the current objectives and nothing else.

mod firewall;
mod l2;
mod te;

pub use firewall::FirewallEngine;
pub use l2::L2Engine;
pub use te::TeEngine;

use crate::error::PolicyError;
use crate::registry::FlowTableSink;
use crate::rule::Rule;
use std::fmt::{Display, Formatter};

/// Flow table priority (higher wins when several entries match a packet)
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub u16);

impl Priority {
    pub const TABLE_MISS: Priority = Priority(0);
    pub const L2: Priority = Priority(1);
    pub const TE: Priority = Priority(2);
    pub const FIREWALL: Priority = Priority(3);
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum EngineState {
    /// No objectives yet
    Empty,
    /// The objectives changed since the last successful compilation
    Loaded,
    /// The rules reflect the current objectives
    Compiled,
}

pub trait PolicyEngine {
    fn name(&self) -> &'static str;

    fn priority(&self) -> Priority;

    fn state(&self) -> EngineState;

    /// Recomputes the rules from the current objectives
    ///
    /// On failure, the previously compiled rules are kept.
    fn compile(&mut self) -> Result<&[Rule], PolicyError>;

    /// The rules produced by the last successful compilation
    fn rules(&self) -> &[Rule];

    /// Hands the compiled rules to the sink, all at once
    fn push(&self, sink: &mut dyn FlowTableSink) {
        sink.install(self.priority(), self.rules());
    }

    fn provision(&mut self, sink: &mut dyn FlowTableSink) -> Result<(), PolicyError> {
        self.compile()?;
        self.push(sink);
        Ok(())
    }
}

/// The compiled rules of an engine, together with its lifecycle state
#[derive(Debug)]
struct CompiledRules {
    rules: Vec<Rule>,
    state: EngineState,
}

impl CompiledRules {
    fn new(state: EngineState) -> Self {
        Self {
            rules: Vec::new(),
            state,
        }
    }

    fn objectives_changed(&mut self) {
        self.state = EngineState::Loaded;
    }

    fn replace(&mut self, engine: &str, rules: Vec<Rule>) -> &[Rule] {
        tracing::info!(engine, rules = rules.len(), "compiled rules");
        self.rules = rules;
        self.state = EngineState::Compiled;
        &self.rules
    }

    /// Stores rules compiled from a subset of the objectives, which leave the engine out of date
    fn replace_partial(&mut self, engine: &str, rules: Vec<Rule>) {
        tracing::info!(engine, rules = rules.len(), "compiled partial rules");
        self.rules = rules;
        if self.state == EngineState::Compiled {
            self.state = EngineState::Loaded;
        }
    }
}
