use crate::topology::NodeId;
use std::fmt::{Display, Formatter};
use std::time::Duration;

#[derive(Clone, Debug, Default)]
pub struct TopologySpec {
    pub nodes: Vec<NodeSpec>,
    pub links: Vec<LinkSpec>,
}

/// A switch together with the host attached to its port 1
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeSpec {
    pub id: NodeId,
    /// Servers run by the attached host (only relevant to network emulation)
    pub servers: Vec<ServerSpec>,
}

impl NodeSpec {
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            servers: Vec::new(),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ServerSpec {
    pub protocol: ServerProtocol,
    pub port: u16,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ServerProtocol {
    Tcp,
    Udp,
}

impl Display for ServerSpec {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let protocol = match self.protocol {
            ServerProtocol::Tcp => "tcp",
            ServerProtocol::Udp => "udp",
        };
        write!(f, "{protocol}/{}", self.port)
    }
}

/// An undirected link between two switches
#[derive(Clone, Debug)]
pub struct LinkSpec {
    pub source: NodeId,
    pub target: NodeId,
    pub bandwidth_bps: u64,
    pub delay: Duration,
}
