//! Match/action rules, the output of every policy engine

use crate::error::InvalidAction;
use crate::topology::{MacAddr, NodeId, PortNo};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;

pub const ETH_TYPE_IPV4: u16 = 0x0800;
pub const IP_PROTO_TCP: u8 = 6;
pub const IP_PROTO_UDP: u8 = 17;

/// Packet header constraints
///
/// Every field is optional and a missing field matches any value. The ether type is the
/// exception to the rule in that it defaults to IPv4 (set it to `None` explicitly to match any
/// ether type). Transport ports are only taken into account when the IP protocol is TCP or UDP.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MatchPattern {
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_mac: Option<MacAddr>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_mac: Option<MacAddr>,
    #[serde(rename = "mac_proto", default = "default_eth_type")]
    pub eth_type: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_proto: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_ip: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_ip: Option<Ipv4Addr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dst_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_port: Option<PortNo>,
}

fn default_eth_type() -> Option<u16> {
    Some(ETH_TYPE_IPV4)
}

impl Default for MatchPattern {
    fn default() -> Self {
        Self {
            eth_type: default_eth_type(),
            ..Self::any()
        }
    }
}

impl MatchPattern {
    /// A pattern without constraints, not even on the ether type
    pub fn any() -> Self {
        Self {
            src_mac: None,
            dst_mac: None,
            eth_type: None,
            ip_proto: None,
            src_ip: None,
            dst_ip: None,
            src_port: None,
            dst_port: None,
            in_port: None,
        }
    }

    /// The pattern for traffic flowing in the opposite direction
    ///
    /// Source and destination MAC, IP and transport ports are swapped. The ingress port is
    /// dropped, because it only makes sense for the original direction.
    pub fn reversed(&self) -> Self {
        Self {
            src_mac: self.dst_mac,
            dst_mac: self.src_mac,
            src_ip: self.dst_ip,
            dst_ip: self.src_ip,
            src_port: self.dst_port,
            dst_port: self.src_port,
            in_port: None,
            ..self.clone()
        }
    }

    fn has_transport_ports(&self) -> bool {
        matches!(self.ip_proto, Some(IP_PROTO_TCP | IP_PROTO_UDP))
    }

    pub fn matches(&self, packet: &PacketHeaders) -> bool {
        fn field<T: PartialEq>(constraint: Option<T>, value: T) -> bool {
            constraint.is_none_or(|c| c == value)
        }

        let transport_ports_match = !self.has_transport_ports()
            || (field(self.src_port, packet.src_port) && field(self.dst_port, packet.dst_port));

        field(self.in_port, packet.in_port)
            && field(self.src_mac, packet.src_mac)
            && field(self.dst_mac, packet.dst_mac)
            && field(self.eth_type, packet.eth_type)
            && field(self.ip_proto, packet.ip_proto)
            && field(self.src_ip, packet.src_ip)
            && field(self.dst_ip, packet.dst_ip)
            && transport_ports_match
    }

    /// Renders the pattern using OpenFlow 1.3 match field names, as a switch would report it
    pub fn openflow(&self) -> OpenFlowMatch<'_> {
        OpenFlowMatch(self)
    }
}

impl Display for MatchPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "src_mac={}, dst_mac={}, mac_proto={}, ip_proto={}, src_ip={}, dst_ip={}, src_port={}, dst_port={}, in_port={}",
            Star(&self.src_mac),
            Star(&self.dst_mac),
            Star(&self.eth_type.map(EtherType)),
            Star(&self.ip_proto),
            Star(&self.src_ip),
            Star(&self.dst_ip),
            Star(&self.src_port),
            Star(&self.dst_port),
            Star(&self.in_port),
        )
    }
}

// Unset fields are displayed as `*`
struct Star<'a, T>(&'a Option<T>);

impl<T: Display> Display for Star<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(value) => Display::fmt(value, f),
            None => f.write_str("*"),
        }
    }
}

struct EtherType(u16);

impl Display for EtherType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

pub struct OpenFlowMatch<'a>(&'a MatchPattern);

impl Display for OpenFlowMatch<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let p = self.0;
        let mut fields: Vec<(&str, String)> = Vec::new();
        if let Some(port) = p.in_port {
            fields.push(("in_port", port.to_string()));
        }
        if let Some(mac) = p.src_mac {
            fields.push(("eth_src", mac.to_string()));
        }
        if let Some(mac) = p.dst_mac {
            fields.push(("eth_dst", mac.to_string()));
        }
        if let Some(eth_type) = p.eth_type {
            fields.push(("eth_type", EtherType(eth_type).to_string()));
        }
        if let Some(ip) = p.src_ip {
            fields.push(("ipv4_src", ip.to_string()));
        }
        if let Some(ip) = p.dst_ip {
            fields.push(("ipv4_dst", ip.to_string()));
        }
        if let Some(proto) = p.ip_proto {
            fields.push(("ip_proto", proto.to_string()));
        }

        let transport_fields = match p.ip_proto {
            Some(IP_PROTO_TCP) => Some(("tcp_src", "tcp_dst")),
            Some(IP_PROTO_UDP) => Some(("udp_src", "udp_dst")),
            _ => None,
        };
        if let Some((src_field, dst_field)) = transport_fields {
            if let Some(port) = p.src_port {
                fields.push((src_field, port.to_string()));
            }
            if let Some(port) = p.dst_port {
                fields.push((dst_field, port.to_string()));
            }
        }

        if fields.is_empty() {
            return f.write_str("any");
        }

        for (i, (name, value)) in fields.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{name}={value}")?;
        }

        Ok(())
    }
}

/// What a switch does with the packets matching a rule
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Forward(PortNo),
    Drop,
    Controller,
}

impl Action {
    /// Creates a forward action, checking that the port is a valid (positive) port number
    pub fn forward(out_port: i64) -> Result<Self, InvalidAction> {
        if out_port <= 0 {
            return Err(InvalidAction::MissingOutPort(Some(out_port)));
        }

        let port =
            PortNo::try_from(out_port).map_err(|_| InvalidAction::OutPortOverflow(out_port))?;
        Ok(Action::Forward(port))
    }

    pub fn validate(&self) -> Result<(), InvalidAction> {
        match self {
            Action::Forward(0) => Err(InvalidAction::MissingOutPort(Some(0))),
            _ => Ok(()),
        }
    }

    pub fn out_port(&self) -> Option<PortNo> {
        match self {
            Action::Forward(port) => Some(*port),
            Action::Drop | Action::Controller => None,
        }
    }

    /// The name of the action type, as used in policy documents
    pub fn type_name(&self) -> &'static str {
        match self {
            Action::Forward(_) => "FORWARD",
            Action::Drop => "DROP",
            Action::Controller => "CONTROLLER",
        }
    }
}

impl Display for Action {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Forward(port) => write!(f, "FORWARD, OutPort={port}"),
            _ => f.write_str(self.type_name()),
        }
    }
}

/// A flow rule: packets matching `match_pattern` at switch `switch_id` are handled by `action`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Rule {
    switch_id: NodeId,
    match_pattern: MatchPattern,
    action: Action,
}

impl Rule {
    pub fn new(switch_id: NodeId, match_pattern: MatchPattern, action: Action) -> Self {
        Self {
            switch_id,
            match_pattern,
            action,
        }
    }

    pub fn switch_id(&self) -> NodeId {
        self.switch_id
    }

    pub fn match_pattern(&self) -> &MatchPattern {
        &self.match_pattern
    }

    pub fn action(&self) -> Action {
        self.action
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Switch: {}", self.switch_id)?;
        writeln!(f, "\tPattern: {}", self.match_pattern)?;
        write!(f, "\tAction: {}", self.action)
    }
}

/// The header fields of a packet, as seen by a switch's flow table
#[derive(Clone, Debug)]
pub struct PacketHeaders {
    pub in_port: PortNo,
    pub src_mac: MacAddr,
    pub dst_mac: MacAddr,
    pub eth_type: u16,
    pub ip_proto: u8,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
}
