//! Traffic-engineering objectives

use crate::rule::MatchPattern;
use crate::topology::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Route the matching traffic through an explicit list of switches
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PassByPathObjective {
    pub match_pattern: MatchPattern,
    pub switches: Vec<NodeId>,
    /// Also route the reverse traffic, along the reversed path
    #[serde(default)]
    pub symmetric: bool,
}

/// Route the matching traffic from `src_switch` to `dst_switch` along a path chosen by the engine
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointObjective {
    pub match_pattern: MatchPattern,
    pub src_switch: NodeId,
    pub dst_switch: NodeId,
    /// Also route the reverse traffic, along the reversed path
    #[serde(default)]
    pub symmetric: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Objective {
    PassByPath(PassByPathObjective),
    /// Take the path with the lowest total delay
    MinLatency(EndpointObjective),
    /// Take the path with the widest bottleneck
    MaxBandwidth(EndpointObjective),
}

impl Objective {
    pub fn kind(&self) -> &'static str {
        match self {
            Objective::PassByPath(_) => "pass-by-path",
            Objective::MinLatency(_) => "min-latency",
            Objective::MaxBandwidth(_) => "max-bandwidth",
        }
    }

    pub fn match_pattern(&self) -> &MatchPattern {
        match self {
            Objective::PassByPath(o) => &o.match_pattern,
            Objective::MinLatency(o) | Objective::MaxBandwidth(o) => &o.match_pattern,
        }
    }

    pub fn symmetric(&self) -> bool {
        match self {
            Objective::PassByPath(o) => o.symmetric,
            Objective::MinLatency(o) | Objective::MaxBandwidth(o) => o.symmetric,
        }
    }
}

/// The full set of objectives of a traffic-engineering engine, grouped by kind
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeObjectives {
    #[serde(default)]
    pub pass_by_paths: Vec<PassByPathObjective>,
    #[serde(default)]
    pub min_latency: Vec<EndpointObjective>,
    #[serde(default)]
    pub max_bandwidth: Vec<EndpointObjective>,
}

impl TeObjectives {
    pub fn push(&mut self, objective: Objective) {
        match objective {
            Objective::PassByPath(o) => self.pass_by_paths.push(o),
            Objective::MinLatency(o) => self.min_latency.push(o),
            Objective::MaxBandwidth(o) => self.max_bandwidth.push(o),
        }
    }

    pub fn len(&self) -> usize {
        self.pass_by_paths.len() + self.min_latency.len() + self.max_bandwidth.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All objectives, grouped by kind in the order they are provisioned
    pub fn iter(&self) -> impl Iterator<Item = Objective> + '_ {
        let pass_by_paths = self.pass_by_paths.iter().cloned().map(Objective::PassByPath);
        let min_latency = self.min_latency.iter().cloned().map(Objective::MinLatency);
        let max_bandwidth = self.max_bandwidth.iter().cloned().map(Objective::MaxBandwidth);
        pass_by_paths.chain(min_latency).chain(max_bandwidth)
    }
}

struct Arrows<'a>(&'a [NodeId]);

impl Display for Arrows<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, node) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" -> ")?;
            }
            write!(f, "{node}")?;
        }
        Ok(())
    }
}

impl Display for Objective {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let (kind, path) = match self {
            Objective::PassByPath(o) => ("PassByPath", o.switches.clone()),
            Objective::MinLatency(o) => ("MinLatency", vec![o.src_switch, o.dst_switch]),
            Objective::MaxBandwidth(o) => ("MaxBandwidth", vec![o.src_switch, o.dst_switch]),
        };

        write!(f, "{kind}: [{}]", Arrows(&path))?;
        if self.symmetric() {
            let reversed: Vec<_> = path.iter().rev().copied().collect();
            write!(f, " and [{}]", Arrows(&reversed))?;
        }
        write!(f, "\n\t{}", self.match_pattern())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rule::IP_PROTO_UDP;

    fn min_latency(symmetric: bool) -> Objective {
        Objective::MinLatency(EndpointObjective {
            match_pattern: MatchPattern {
                ip_proto: Some(IP_PROTO_UDP),
                ..MatchPattern::default()
            },
            src_switch: 1,
            dst_switch: 6,
            symmetric,
        })
    }

    #[test]
    fn test_display() {
        let pass_by = Objective::PassByPath(PassByPathObjective {
            match_pattern: MatchPattern::any(),
            switches: vec![2, 4, 5],
            symmetric: true,
        });
        assert_eq!(
            pass_by.to_string(),
            "PassByPath: [2 -> 4 -> 5] and [5 -> 4 -> 2]\n\tsrc_mac=*, dst_mac=*, mac_proto=*, ip_proto=*, src_ip=*, dst_ip=*, src_port=*, dst_port=*, in_port=*"
        );

        let display = min_latency(false).to_string();
        assert!(display.starts_with("MinLatency: [1 -> 6]\n\t"), "{display}");
        let display = min_latency(true).to_string();
        assert!(
            display.starts_with("MinLatency: [1 -> 6] and [6 -> 1]\n\t"),
            "{display}"
        );
    }

    #[test]
    fn test_objectives_are_grouped_by_kind() {
        let mut objectives = TeObjectives::default();
        assert!(objectives.is_empty());

        objectives.push(min_latency(true));
        objectives.push(Objective::MaxBandwidth(EndpointObjective {
            match_pattern: MatchPattern::default(),
            src_switch: 4,
            dst_switch: 3,
            symmetric: false,
        }));
        objectives.push(Objective::PassByPath(PassByPathObjective {
            match_pattern: MatchPattern::default(),
            switches: vec![1, 2],
            symmetric: false,
        }));

        assert_eq!(objectives.len(), 3);
        let kinds: Vec<_> = objectives.iter().map(|o| o.kind()).collect();
        assert_eq!(kinds, ["pass-by-path", "min-latency", "max-bandwidth"]);
    }
}
