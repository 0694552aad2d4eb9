mod config;
mod controller;
mod report;

use crate::config::cli::{CliOpt, Command, Protocol, Provisioning, TeOpt, TraceOpt};
use crate::config::{load_topology, read_policy};
use anyhow::{Context, bail};
use clap::Parser;
use flow_compiler::engine::{FirewallEngine, L2Engine, PolicyEngine, TeEngine};
use flow_compiler::registry::SwitchRegistry;
use flow_compiler::rule::{ETH_TYPE_IPV4, IP_PROTO_TCP, IP_PROTO_UDP, PacketHeaders};
use flow_compiler::topology::ip::Ipv4Cidr;
use flow_compiler::topology::{HOST_PORT, NodeId, Topology, ip_of, mac_of};
use std::fs;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let options = CliOpt::parse();
    let topology = Arc::new(load_topology(&options.topology)?);
    tracing::info!(
        switches = topology.node_ids().count(),
        links = topology.links().count(),
        "loaded topology"
    );
    let mut registry = connect_switches(&topology, options.switches.as_deref())?;

    match options.command {
        Command::Hosts => report::print_hosts(&topology, &options.ip_base)?,
        Command::Links => report::print_links(&topology),
        Command::Firewall(firewall) => {
            let mut engine = FirewallEngine::new();
            engine.load_json(&read_policy(&firewall.policy)?)?;
            engine.provision_firewall(&mut registry)?;
            report::print_rules("Firewall rules", engine.rules());
        }
        Command::L2 => {
            let mut engine = L2Engine::new(topology.clone());
            engine.provision_connectivity(&mut registry)?;
            report::print_rules("L2 rules", engine.rules());
        }
        Command::Te(te) => run_te(&topology, &mut registry, &te)?,
        Command::Controller(engines) => {
            let mut engines = controller::load_engines(&topology, &engines)?;
            controller::provision(&mut engines, &mut registry)?;
            report::print_flow_tables(&registry);
        }
        Command::Trace(trace) => run_trace(&topology, &mut registry, &options.ip_base, &trace)?,
        Command::SaveTe(save) => {
            let mut engine = TeEngine::new(topology.clone());
            engine.load_json(&read_policy(&save.policy)?)?;
            let json = engine.to_json()?;
            fs::write(&save.output, json)
                .with_context(|| format!("failed to write policy to {}", save.output.display()))?;
            println!(
                "Saved {} objectives to {}",
                engine.objectives().len(),
                save.output.display()
            );
        }
    }

    Ok(())
}

/// Registers the switches that take part in the run (every switch if none are given)
fn connect_switches(topology: &Topology, switches: Option<&[NodeId]>) -> anyhow::Result<SwitchRegistry> {
    let mut registry = SwitchRegistry::new();
    match switches {
        Some(switches) => {
            for &switch in switches {
                if !topology.contains(switch) {
                    bail!("switch {switch} is not part of the topology");
                }
                registry.register(switch);
            }
        }
        None => {
            for switch in topology.node_ids() {
                registry.register(switch);
            }
        }
    }

    Ok(registry)
}

fn run_te(topology: &Arc<Topology>, registry: &mut SwitchRegistry, options: &TeOpt) -> anyhow::Result<()> {
    let mut engine = TeEngine::new(topology.clone());
    engine.load_json(&read_policy(&options.policy)?)?;
    report::print_objectives(engine.objectives());

    let steps = if options.provision.is_empty() {
        &[Provisioning::All][..]
    } else {
        &options.provision[..]
    };

    for &step in steps {
        let title = match step {
            Provisioning::PassByPaths => {
                engine.provision_pass_by_paths(registry)?;
                "Pass-by-path rules"
            }
            Provisioning::MinLatency => {
                engine.provision_min_latency_paths(registry)?;
                "Min-latency rules"
            }
            Provisioning::MaxBandwidth => {
                engine.provision_max_bandwidth_paths(registry)?;
                "Max-bandwidth rules"
            }
            Provisioning::All => {
                engine.provision_all(registry)?;
                "TE rules"
            }
        };

        report::print_rules(title, engine.rules());
    }

    Ok(())
}

fn run_trace(
    topology: &Arc<Topology>,
    registry: &mut SwitchRegistry,
    ip_base: &Ipv4Cidr,
    options: &TraceOpt,
) -> anyhow::Result<()> {
    for switch in [options.from, options.to] {
        if !topology.contains(switch) {
            bail!("switch {switch} is not part of the topology");
        }
    }

    let mut engines = controller::load_engines(topology, &options.engines)?;
    controller::provision(&mut engines, registry)?;

    let packet = PacketHeaders {
        in_port: HOST_PORT,
        src_mac: mac_of(options.from),
        dst_mac: mac_of(options.to),
        eth_type: ETH_TYPE_IPV4,
        ip_proto: match options.protocol {
            Protocol::Tcp => IP_PROTO_TCP,
            Protocol::Udp => IP_PROTO_UDP,
        },
        src_ip: ip_of(options.from, ip_base)?,
        dst_ip: ip_of(options.to, ip_base)?,
        src_port: options.src_port,
        dst_port: options.dst_port,
    };

    let trace = registry.trace(topology, options.from, &packet);
    report::print_trace(&trace);
    Ok(())
}
