use crate::error::{InvalidAction, PolicyError};
use crate::policy::malformed;
use crate::rule::{Action, MatchPattern, Rule};
use crate::topology::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A firewall rule as stored on disk, with the match fields inlined
///
/// Every key other than the rule's own fields is parsed as a match field, so misspelled keys are
/// rejected instead of silently widening the match.
#[derive(Serialize, Deserialize)]
struct FirewallEntry {
    switch_id: NodeId,
    action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    out_port: Option<i64>,
    #[serde(flatten)]
    match_fields: Map<String, Value>,
}

impl FirewallEntry {
    fn into_rule(self) -> Result<Rule, PolicyError> {
        let action = match self.action_type.as_str() {
            "FORWARD" => {
                let out_port = self.out_port.ok_or(InvalidAction::MissingOutPort(None))?;
                Action::forward(out_port)?
            }
            "DROP" => Action::Drop,
            "CONTROLLER" => Action::Controller,
            other => {
                return Err(PolicyError::MalformedPolicy(format!(
                    "unknown action type `{other}` (expected FORWARD, DROP or CONTROLLER)"
                )));
            }
        };

        if let (None, Some(out_port)) = (action.out_port(), self.out_port) {
            return Err(InvalidAction::UnexpectedOutPort {
                action: action.type_name(),
                out_port,
            }
            .into());
        }

        let match_pattern: MatchPattern =
            serde_json::from_value(Value::Object(self.match_fields)).map_err(malformed)?;
        Ok(Rule::new(self.switch_id, match_pattern, action))
    }
}

impl TryFrom<&Rule> for FirewallEntry {
    type Error = PolicyError;

    fn try_from(rule: &Rule) -> Result<Self, Self::Error> {
        let Value::Object(match_fields) =
            serde_json::to_value(rule.match_pattern()).map_err(malformed)?
        else {
            return Err(PolicyError::MalformedPolicy(
                "match pattern is not serialized as an object".to_string(),
            ));
        };

        let action = rule.action();
        Ok(Self {
            switch_id: rule.switch_id(),
            action_type: action.type_name().to_string(),
            out_port: action.out_port().map(i64::from),
            match_fields,
        })
    }
}

/// Parses a firewall policy: an array of rules, each with its match fields inlined
pub fn firewall_from_json(json: &str) -> Result<Vec<Rule>, PolicyError> {
    let entries: Vec<FirewallEntry> = serde_json::from_str(json).map_err(malformed)?;
    entries.into_iter().map(FirewallEntry::into_rule).collect()
}

pub fn firewall_to_json(rules: &[Rule]) -> Result<String, PolicyError> {
    let entries = rules
        .iter()
        .map(FirewallEntry::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    serde_json::to_string_pretty(&entries).map_err(malformed)
}
