use clap::{Args, Parser, Subcommand, ValueEnum};
use flow_compiler::topology::NodeId;
use flow_compiler::topology::ip::Ipv4Cidr;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct CliOpt {
    /// Path to the JSON file containing the topology
    #[arg(long)]
    pub topology: PathBuf,

    /// The subnet from which the IP addresses of the hosts are derived
    #[arg(long, default_value = "10.0.0.0/24")]
    pub ip_base: Ipv4Cidr,

    /// Comma-separated ids of the switches connected to the controller (defaults to every switch
    /// in the topology)
    #[arg(long, value_delimiter = ',')]
    pub switches: Option<Vec<NodeId>>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the hosts and their addresses
    Hosts,
    /// List the links and the ports they use at each end
    Links,
    /// Compile a firewall policy
    Firewall(FirewallOpt),
    /// Compile the rules for full L2 connectivity between hosts
    L2,
    /// Compile a traffic-engineering policy
    Te(TeOpt),
    /// Run the selected engines against the connected switches and show their flow tables
    Controller(EnginesOpt),
    /// Follow a packet through the flow tables produced by the selected engines
    Trace(TraceOpt),
    /// Load a traffic-engineering policy and save it again
    SaveTe(SaveTeOpt),
}

#[derive(Parser, Debug, Clone)]
pub struct FirewallOpt {
    /// Path to the JSON file containing the firewall policy
    #[arg(long)]
    pub policy: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct TeOpt {
    /// Path to the JSON file containing the traffic-engineering objectives
    #[arg(long)]
    pub policy: PathBuf,

    /// The objectives to provision, in order (defaults to all of them at once)
    #[arg(long, value_enum)]
    pub provision: Vec<Provisioning>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioning {
    PassByPaths,
    MinLatency,
    MaxBandwidth,
    All,
}

#[derive(Args, Debug, Clone)]
pub struct EnginesOpt {
    /// Path to a firewall policy to enforce
    #[arg(long)]
    pub firewall: Option<PathBuf>,

    /// Path to a traffic-engineering policy to provision
    #[arg(long)]
    pub te: Option<PathBuf>,

    /// Do not provision L2 connectivity
    #[arg(long)]
    pub no_l2: bool,
}

#[derive(Parser, Debug, Clone)]
pub struct TraceOpt {
    /// The switch whose host sends the packet
    #[arg(long)]
    pub from: NodeId,

    /// The switch whose host the packet is addressed to
    #[arg(long)]
    pub to: NodeId,

    #[arg(long, value_enum, default_value_t = Protocol::Udp)]
    pub protocol: Protocol,

    #[arg(long, default_value_t = 40_000)]
    pub src_port: u16,

    #[arg(long, default_value_t = 80)]
    pub dst_port: u16,

    #[command(flatten)]
    pub engines: EnginesOpt,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

#[derive(Parser, Debug, Clone)]
pub struct SaveTeOpt {
    /// Path to the JSON file containing the traffic-engineering objectives
    #[arg(long)]
    pub policy: PathBuf,

    /// Path to which the objectives are written
    #[arg(long)]
    pub output: PathBuf,
}
