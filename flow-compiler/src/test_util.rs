use crate::rule::{ETH_TYPE_IPV4, IP_PROTO_TCP, IP_PROTO_UDP, PacketHeaders};
use crate::topology::ip::Ipv4Cidr;
use crate::topology::{
    HOST_PORT, LinkSpec, NodeId, NodeSpec, ServerProtocol, ServerSpec, Topology, TopologySpec,
    ip_of, mac_of,
};
use bon::builder;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BANDWIDTH_MBPS: u64 = 100;
const DEFAULT_DELAY_MS: u64 = 1;

#[builder]
pub fn link(
    source: NodeId,
    target: NodeId,
    bandwidth_mbps: Option<u64>,
    delay_ms: Option<u64>,
) -> LinkSpec {
    LinkSpec {
        source,
        target,
        bandwidth_bps: bandwidth_mbps.unwrap_or(DEFAULT_BANDWIDTH_MBPS) * 1_000_000,
        delay: Duration::from_millis(delay_ms.unwrap_or(DEFAULT_DELAY_MS)),
    }
}

/// A topology with one node per link endpoint
pub fn topology(links: &[LinkSpec]) -> Topology {
    let ids: BTreeSet<_> = links.iter().flat_map(|l| [l.source, l.target]).collect();
    let spec = TopologySpec {
        nodes: ids.into_iter().map(NodeSpec::new).collect(),
        links: links.to_vec(),
    };
    Topology::new(spec).unwrap()
}

/// A small ISP-like network with six switches
///
/// ```text
///  1 ---- 2 ---- 3
///  |    / |    / |
///  |  /   |  /   |
///  4 ---- 5 ---- 6
/// ```
pub fn isp_spec() -> TopologySpec {
    let server = |protocol, port| ServerSpec { protocol, port };
    let mut nodes: Vec<_> = (1..=6).map(NodeSpec::new).collect();
    nodes[2].servers.push(server(ServerProtocol::Udp, 80));
    nodes[4].servers.push(server(ServerProtocol::Tcp, 5050));
    nodes[5].servers.push(server(ServerProtocol::Udp, 5050));

    let links = [
        (1, 2, 100, 10),
        (1, 4, 50, 5),
        (2, 3, 100, 10),
        (2, 4, 50, 3),
        (2, 5, 50, 3),
        (3, 5, 10, 5),
        (3, 6, 100, 10),
        (4, 5, 10, 1),
        (5, 6, 100, 3),
    ]
    .into_iter()
    .map(|(source, target, bandwidth_mbps, delay_ms)| {
        link()
            .source(source)
            .target(target)
            .bandwidth_mbps(bandwidth_mbps)
            .delay_ms(delay_ms)
            .call()
    })
    .collect();

    TopologySpec { nodes, links }
}

pub fn isp_topology() -> Arc<Topology> {
    Arc::new(Topology::new(isp_spec()).unwrap())
}

/// A UDP datagram from the host of switch `src` to the host of switch `dst`
pub fn udp_packet(src: NodeId, dst: NodeId, dst_port: u16) -> PacketHeaders {
    let base = Ipv4Cidr::default();
    PacketHeaders {
        in_port: HOST_PORT,
        src_mac: mac_of(src),
        dst_mac: mac_of(dst),
        eth_type: ETH_TYPE_IPV4,
        ip_proto: IP_PROTO_UDP,
        src_ip: ip_of(src, &base).unwrap(),
        dst_ip: ip_of(dst, &base).unwrap(),
        src_port: 40_000,
        dst_port,
    }
}

/// Like [`udp_packet`], but carrying TCP
pub fn tcp_packet(src: NodeId, dst: NodeId, dst_port: u16) -> PacketHeaders {
    PacketHeaders {
        ip_proto: IP_PROTO_TCP,
        ..udp_packet(src, dst, dst_port)
    }
}
