//! Compilation of node paths into per-switch forwarding rules

pub mod select;

use crate::error::PolicyError;
use crate::rule::{Action, MatchPattern, Rule};
use crate::topology::{HOST_PORT, NodeId, PortNo, Topology};

/// The ports a single switch uses to carry traffic along a path
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PathSegment {
    pub switch_id: NodeId,
    pub in_port: PortNo,
    pub out_port: PortNo,
}

/// Splits `path` into one segment per switch, in path order
///
/// Traffic enters the first switch from its host and leaves the last switch towards its host,
/// so both ends of the path use [`HOST_PORT`].
pub fn segment_path(topology: &Topology, path: &[NodeId]) -> Result<Vec<PathSegment>, PolicyError> {
    let Some(&last) = path.last().filter(|_| path.len() >= 2) else {
        return Err(PolicyError::PathTooShort { len: path.len() });
    };

    let mut segments = Vec::with_capacity(path.len());
    let mut in_port = HOST_PORT;
    for pair in path.windows(2) {
        let (from, to) = (pair[0], pair[1]);
        let (out_port, next_in_port) = topology
            .link_ports(from, to)
            .ok_or(PolicyError::InvalidPath { from, to })?;

        segments.push(PathSegment {
            switch_id: from,
            in_port,
            out_port,
        });
        in_port = next_in_port;
    }

    segments.push(PathSegment {
        switch_id: last,
        in_port,
        out_port: HOST_PORT,
    });

    Ok(segments)
}

/// Returns the rules that forward traffic matching `template` along `path`, source switch first
///
/// When `include_in_port` is set, every rule additionally matches the port through which the
/// traffic enters its switch. Otherwise, the rules never match on the ingress port (even if the
/// template does).
pub fn compile_path(
    topology: &Topology,
    path: &[NodeId],
    template: &MatchPattern,
    include_in_port: bool,
) -> Result<Vec<Rule>, PolicyError> {
    let rules = segment_path(topology, path)?
        .into_iter()
        .map(|segment| {
            let match_pattern = MatchPattern {
                in_port: include_in_port.then_some(segment.in_port),
                ..template.clone()
            };
            Rule::new(
                segment.switch_id,
                match_pattern,
                Action::Forward(segment.out_port),
            )
        })
        .collect();

    Ok(rules)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::rule::IP_PROTO_TCP;
    use crate::test_util::isp_topology;
    use std::net::Ipv4Addr;

    fn segment(switch_id: NodeId, in_port: PortNo, out_port: PortNo) -> PathSegment {
        PathSegment {
            switch_id,
            in_port,
            out_port,
        }
    }

    #[test]
    fn test_segment_path() {
        let topology = isp_topology();
        let segments = segment_path(&topology, &[1, 2, 5, 6]).unwrap();
        assert_eq!(
            segments,
            [
                segment(1, 1, 2),
                segment(2, 2, 5),
                segment(5, 2, 5),
                segment(6, 3, 1),
            ]
        );

        let segments = segment_path(&topology, &[6, 5]).unwrap();
        assert_eq!(segments, [segment(6, 1, 3), segment(5, 5, 1)]);
    }

    #[test]
    fn test_segment_count_matches_path_length() {
        let topology = isp_topology();
        let paths: [&[NodeId]; 4] = [&[1, 2], &[1, 4, 5], &[3, 2, 4, 1], &[1, 2, 3, 5, 4]];
        for path in paths {
            let segments = segment_path(&topology, path).unwrap();
            let switches: Vec<_> = segments.iter().map(|s| s.switch_id).collect();
            assert_eq!(switches, path);
        }
    }

    #[test]
    fn test_segment_path_rejects_invalid_paths() {
        let topology = isp_topology();
        assert_eq!(
            segment_path(&topology, &[1, 2, 6]),
            Err(PolicyError::InvalidPath { from: 2, to: 6 })
        );
        assert_eq!(
            segment_path(&topology, &[1, 1]),
            Err(PolicyError::InvalidPath { from: 1, to: 1 })
        );
        assert_eq!(
            segment_path(&topology, &[1, 42]),
            Err(PolicyError::InvalidPath { from: 1, to: 42 })
        );
        assert_eq!(
            segment_path(&topology, &[1]),
            Err(PolicyError::PathTooShort { len: 1 })
        );
        assert_eq!(
            segment_path(&topology, &[]),
            Err(PolicyError::PathTooShort { len: 0 })
        );
    }

    #[test]
    fn test_compile_path_with_in_port() {
        let topology = isp_topology();
        let template = MatchPattern {
            ip_proto: Some(IP_PROTO_TCP),
            src_ip: Some(Ipv4Addr::new(10, 0, 0, 2)),
            dst_ip: Some(Ipv4Addr::new(10, 0, 0, 5)),
            ..MatchPattern::default()
        };

        let rules = compile_path(&topology, &[2, 4, 5], &template, true).unwrap();
        let summary: Vec<_> = rules
            .iter()
            .map(|r| (r.switch_id(), r.match_pattern().in_port, r.action()))
            .collect();
        assert_eq!(
            summary,
            [
                (2, Some(1), Action::Forward(4)),
                (4, Some(3), Action::Forward(4)),
                (5, Some(4), Action::Forward(1)),
            ]
        );

        for rule in &rules {
            let pattern = MatchPattern {
                in_port: None,
                ..rule.match_pattern().clone()
            };
            assert_eq!(pattern, template);
        }
    }

    #[test]
    fn test_compile_path_without_in_port() {
        let topology = isp_topology();
        let template = MatchPattern {
            in_port: Some(7),
            ..MatchPattern::default()
        };

        let rules = compile_path(&topology, &[1, 2, 3, 6], &template, false).unwrap();
        assert_eq!(rules.len(), 4);
        assert!(rules.iter().all(|r| r.match_pattern().in_port.is_none()));
    }
}
