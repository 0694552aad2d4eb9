use flow_compiler::objective::TeObjectives;
use flow_compiler::registry::{SwitchRegistry, Trace};
use flow_compiler::rule::Rule;
use flow_compiler::topology::ip::Ipv4Cidr;
use flow_compiler::topology::{Topology, ip_of, mac_of};

pub fn print_hosts(topology: &Topology, ip_base: &Ipv4Cidr) -> anyhow::Result<()> {
    println!("--- Hosts ---");
    for node in topology.nodes() {
        let ip = ip_of(node.id, ip_base)?;
        print!("* {}: {ip} ({})", node.id, mac_of(node.id));
        if !node.servers.is_empty() {
            let servers: Vec<_> = node.servers.iter().map(|s| s.to_string()).collect();
            print!(", serving {}", servers.join(", "));
        }
        println!();
    }

    Ok(())
}

pub fn print_links(topology: &Topology) {
    println!("--- Links ---");
    for (a, b, link) in topology.links() {
        let Some((port_a, port_b)) = topology.link_ports(a, b) else {
            continue;
        };

        println!(
            "* {a} (port {port_a}) <-> {b} (port {port_b}): {} Mbps, {} ms",
            link.bandwidth_bps / 1_000_000,
            link.delay.as_millis()
        );
    }
}

pub fn print_rules(title: &str, rules: &[Rule]) {
    println!("--- {title} ({} rules) ---", rules.len());
    for rule in rules {
        println!("{rule}");
    }
}

pub fn print_objectives(objectives: &TeObjectives) {
    println!("--- Objectives ---");
    for objective in objectives.iter() {
        println!("* {objective}");
    }
}

pub fn print_flow_tables(registry: &SwitchRegistry) {
    println!("--- Flow tables ---");
    for (switch, table) in registry.tables() {
        println!("* Switch {switch} ({} entries)", table.len());
        for entry in table.entries() {
            println!("  | {entry}");
        }
    }
}

pub fn print_trace(trace: &Trace) {
    let switches: Vec<_> = trace.switches.iter().map(|s| s.to_string()).collect();
    println!("--- Trace ---");
    println!("* Path: {}", switches.join(" -> "));
    println!("* Outcome: {}", trace.outcome);
}
