use anyhow::{Context, bail};
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// An IPv4 subnet in CIDR notation, used as the base from which host addresses are derived
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ipv4Cidr {
    pub(crate) address: Ipv4Addr,
    pub(crate) network_prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(address: Ipv4Addr, network_prefix: u8) -> anyhow::Result<Self> {
        if network_prefix == 0 || network_prefix > 32 {
            bail!("network prefix must be between 1 and 32, got {network_prefix}");
        }

        Ok(Self {
            address,
            network_prefix,
        })
    }

    fn mask(&self) -> u32 {
        u32::MAX << (32 - self.network_prefix)
    }

    /// The first address of the subnet (host bits cleared)
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from_bits(self.address.to_bits() & self.mask())
    }

    /// The last address of the subnet (host bits set)
    pub fn last(&self) -> Ipv4Addr {
        Ipv4Addr::from_bits(self.address.to_bits() | !self.mask())
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        (self.network()..=self.last()).contains(&ip)
    }
}

impl Default for Ipv4Cidr {
    fn default() -> Self {
        Self {
            address: Ipv4Addr::new(10, 0, 0, 0),
            network_prefix: 24,
        }
    }
}

impl Display for Ipv4Cidr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.address, self.network_prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = anyhow::Error;

    /// Parses `a.b.c.d/prefix`, where a bare address stands for a /32 subnet
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (address, prefix) = s.split_once('/').unwrap_or((s, "32"));
        let address: IpAddr = address
            .parse()
            .with_context(|| format!("invalid address in subnet `{s}`"))?;
        let IpAddr::V4(address) = address else {
            bail!("subnet `{s}` is not an IPv4 subnet");
        };

        let network_prefix: u8 = prefix
            .parse()
            .with_context(|| format!("invalid network prefix in subnet `{s}`"))?;
        Self::new(address, network_prefix)
    }
}

#[test]
fn test_ipv4_cidr() {
    let cases = [
        ("10.0.0.0/24", "10.0.0.0", "10.0.0.255"),
        ("10.0.0.123/24", "10.0.0.0", "10.0.0.255"),
        ("10.0.0.0/8", "10.0.0.0", "10.255.255.255"),
        ("20.0.0.0/12", "20.0.0.0", "20.15.255.255"),
        ("192.168.1.7", "192.168.1.7", "192.168.1.7"),
    ];

    for (input, network, last) in cases {
        let cidr = Ipv4Cidr::from_str(input).unwrap();
        assert_eq!(cidr.network().to_string(), network);
        assert_eq!(cidr.last().to_string(), last);
    }

    for invalid in ["", "10.0.0.0/0", "10.0.0.0/33", "10.0.0.0/24/1", "::1/64"] {
        assert!(Ipv4Cidr::from_str(invalid).is_err(), "{invalid}");
    }
}
