use crate::config::topology::TopologyJson;
use anyhow::Context;
use flow_compiler::topology::{Topology, TopologySpec};
use std::fs;
use std::path::Path;

pub mod cli;
pub mod topology;

pub fn load_topology(path: &Path) -> anyhow::Result<Topology> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read topology from {}", path.display()))?;
    let json: TopologyJson = serde_json::from_str(&json)
        .with_context(|| format!("failed to parse topology from {}", path.display()))?;
    let spec = TopologySpec::try_from(json)?;
    Topology::new(spec).with_context(|| format!("invalid topology at {}", path.display()))
}

pub fn read_policy(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read policy from {}", path.display()))
}
