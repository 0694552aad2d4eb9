use anyhow::Context;
use flow_compiler::topology::{
    LinkSpec, NodeId, NodeSpec, ServerProtocol, ServerSpec, TopologySpec,
};
use serde::Deserialize;
use std::time::Duration;

#[derive(Deserialize, Clone)]
pub struct TopologyJson {
    nodes: Vec<NodeJson>,
    links: Vec<LinkJson>,
}

#[derive(Deserialize, Clone)]
struct NodeJson {
    id: NodeId,
    /// Whether the host attached to this switch runs a TCP server
    #[serde(default)]
    tcp_server: bool,
    #[serde(default = "default_tcp_port")]
    tcp_port: u16,
    /// Whether the host attached to this switch runs a UDP server
    #[serde(default)]
    udp_server: bool,
    #[serde(default = "default_udp_port")]
    udp_port: u16,
}

fn default_tcp_port() -> u16 {
    80
}

fn default_udp_port() -> u16 {
    8080
}

#[derive(Deserialize, Clone)]
struct LinkJson {
    source: NodeId,
    target: NodeId,
    /// The link's bandwidth, in megabits per second
    #[serde(alias = "bw")]
    bandwidth_mbps: u64,
    /// The delay of the link, in milliseconds
    #[serde(alias = "delay")]
    delay_ms: u64,
}

impl TryFrom<TopologyJson> for TopologySpec {
    type Error = anyhow::Error;

    fn try_from(json: TopologyJson) -> Result<Self, Self::Error> {
        let nodes = json
            .nodes
            .into_iter()
            .map(|n| {
                let mut servers = Vec::new();
                if n.tcp_server {
                    servers.push(ServerSpec {
                        protocol: ServerProtocol::Tcp,
                        port: n.tcp_port,
                    });
                }
                if n.udp_server {
                    servers.push(ServerSpec {
                        protocol: ServerProtocol::Udp,
                        port: n.udp_port,
                    });
                }

                NodeSpec { id: n.id, servers }
            })
            .collect();

        let links = json
            .links
            .into_iter()
            .map(LinkSpec::try_from)
            .collect::<anyhow::Result<_>>()?;

        Ok(Self { nodes, links })
    }
}

impl TryFrom<LinkJson> for LinkSpec {
    type Error = anyhow::Error;

    fn try_from(l: LinkJson) -> Result<Self, Self::Error> {
        let bandwidth_bps = l.bandwidth_mbps.checked_mul(1_000_000).with_context(|| {
            format!(
                "bandwidth of link {}-{} is out of range: {} Mbps",
                l.source, l.target, l.bandwidth_mbps
            )
        })?;

        Ok(LinkSpec {
            source: l.source,
            target: l.target,
            bandwidth_bps,
            delay: Duration::from_millis(l.delay_ms),
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_topology() {
        let json = r#"{
            "nodes": [
                {"id": 1},
                {"id": 2, "tcp_server": true},
                {"id": 3, "udp_server": true, "udp_port": 80, "tcp_port": 22}
            ],
            "links": [
                {"source": 1, "target": 2, "bandwidth_mbps": 100, "delay_ms": 10},
                {"source": 2, "target": 3, "bw": 50, "delay": 3}
            ]
        }"#;

        let json: TopologyJson = serde_json::from_str(json).unwrap();
        let spec = TopologySpec::try_from(json).unwrap();

        assert!(spec.nodes[0].servers.is_empty());
        assert_eq!(spec.nodes[1].servers[0].to_string(), "tcp/80");
        assert_eq!(spec.nodes[2].servers.len(), 1);
        assert_eq!(spec.nodes[2].servers[0].to_string(), "udp/80");

        assert_eq!(spec.links[0].bandwidth_bps, 100_000_000);
        assert_eq!(spec.links[0].delay, Duration::from_millis(10));
        assert_eq!(spec.links[1].bandwidth_bps, 50_000_000);
        assert_eq!(spec.links[1].delay, Duration::from_millis(3));
    }

    #[test]
    fn test_reject_out_of_range_bandwidth() {
        let json = format!(
            r#"{{"nodes": [{{"id": 1}}, {{"id": 2}}], "links": [{{"source": 1, "target": 2, "bw": {}, "delay": 1}}]}}"#,
            u64::MAX
        );
        let json: TopologyJson = serde_json::from_str(&json).unwrap();
        assert!(TopologySpec::try_from(json).is_err());
    }
}
