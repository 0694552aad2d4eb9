use crate::error::PolicyError;
use crate::objective::TeObjectives;
use crate::policy::malformed;

/// Parses a traffic-engineering policy (missing objective lists are treated as empty)
pub fn te_from_json(json: &str) -> Result<TeObjectives, PolicyError> {
    serde_json::from_str(json).map_err(malformed)
}

pub fn te_to_json(objectives: &TeObjectives) -> Result<String, PolicyError> {
    serde_json::to_string_pretty(objectives).map_err(malformed)
}
