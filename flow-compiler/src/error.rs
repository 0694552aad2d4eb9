use crate::topology::NodeId;
use crate::topology::ip::Ipv4Cidr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("switches `{from}` and `{to}` are not adjacent in the topology")]
    InvalidPath { from: NodeId, to: NodeId },
    #[error("a path must visit at least two switches, but this one visits {len}")]
    PathTooShort { len: usize },
    #[error("no path from switch `{src}` to switch `{dst}` satisfies the objective")]
    UnreachableObjective { src: NodeId, dst: NodeId },
    #[error("malformed policy document: {0}")]
    MalformedPolicy(String),
    #[error("invalid action: {0}")]
    InvalidAction(InvalidAction),
    #[error("invalid topology: {0}")]
    InvalidTopology(String),
    #[error("the address of node `{node}` falls outside of the base subnet {base}")]
    AddressOutOfRange { node: NodeId, base: Ipv4Cidr },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidAction {
    #[error("FORWARD requires a positive out_port, got {0:?}")]
    MissingOutPort(Option<i64>),
    #[error("FORWARD out_port {0} does not fit in a port number")]
    OutPortOverflow(i64),
    #[error("{action} does not take an out_port, got {out_port}")]
    UnexpectedOutPort { action: &'static str, out_port: i64 },
}

impl From<InvalidAction> for PolicyError {
    fn from(e: InvalidAction) -> Self {
        PolicyError::InvalidAction(e)
    }
}
