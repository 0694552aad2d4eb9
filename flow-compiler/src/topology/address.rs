//! Deterministic host addressing
//!
//! Every node id doubles as the seed of its host's link-layer and IPv4 address, so the
//! controller and the emulated network agree on addresses without exchanging them.

use crate::error::PolicyError;
use crate::topology::NodeId;
use crate::topology::ip::Ipv4Cidr;
use anyhow::{Context, bail};
use std::fmt::{Display, Formatter};
use std::net::Ipv4Addr;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl Display for MacAddr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl FromStr for MacAddr {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; 6];
        let mut parts = s.split(':');
        for byte in &mut bytes {
            let part = parts
                .next()
                .with_context(|| format!("mac address `{s}` has less than 6 octets"))?;
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                bail!("mac address `{s}` contains an octet that is not two hex digits");
            }
            *byte = u8::from_str_radix(part, 16)
                .with_context(|| format!("invalid octet `{part}` in mac address `{s}`"))?;
        }

        if parts.next().is_some() {
            bail!("mac address `{s}` has more than 6 octets");
        }

        Ok(Self(bytes))
    }
}

/// Returns the MAC address of the host attached to switch `id`
///
/// The id is written big-endian into the low 32 bits of the address, e.g. node 1 maps to
/// `00:00:00:00:00:01`.
pub fn mac_of(id: NodeId) -> MacAddr {
    let [a, b, c, d] = id.to_be_bytes();
    MacAddr([0, 0, a, b, c, d])
}

/// Returns the IPv4 address of the host attached to switch `id`, offset from the base network
pub fn ip_of(id: NodeId, base: &Ipv4Cidr) -> Result<Ipv4Addr, PolicyError> {
    let out_of_range = || PolicyError::AddressOutOfRange {
        node: id,
        base: *base,
    };

    let bits = base
        .network()
        .to_bits()
        .checked_add(id)
        .ok_or_else(out_of_range)?;
    let ip = Ipv4Addr::from_bits(bits);
    if id == 0 || !base.contains(ip) {
        return Err(out_of_range());
    }

    Ok(ip)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_mac_of_matches_zero_padded_hex() {
        assert_eq!(mac_of(1).to_string(), "00:00:00:00:00:01");
        assert_eq!(mac_of(6).to_string(), "00:00:00:00:00:06");
        assert_eq!(mac_of(0x1234).to_string(), "00:00:00:00:12:34");
        assert_eq!(mac_of(0xabcdef).to_string(), "00:00:00:ab:cd:ef");
    }

    #[test]
    fn test_mac_round_trips_through_display() {
        let mac = mac_of(0xdead_beef);
        assert_eq!(mac.to_string().parse::<MacAddr>().unwrap(), mac);

        let invalid_macs = [
            "",
            "00:00:00:00:00",
            "00:00:00:00:00:00:00",
            "0:00:00:00:00:01",
            "zz:00:00:00:00:01",
            "+1:00:00:00:00:01",
            "00:00:-0:00:00:01",
        ];
        for invalid in invalid_macs {
            assert!(invalid.parse::<MacAddr>().is_err(), "{invalid}");
        }
    }

    #[test]
    fn test_ip_of_offsets_from_base_network() {
        let base = Ipv4Cidr::default();
        assert_eq!(ip_of(1, &base).unwrap(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(ip_of(6, &base).unwrap(), Ipv4Addr::new(10, 0, 0, 6));

        // The host part of the configured address is ignored
        let base: Ipv4Cidr = "192.168.7.99/16".parse().unwrap();
        assert_eq!(ip_of(300, &base).unwrap(), Ipv4Addr::new(192, 168, 1, 44));
    }

    #[test]
    fn test_ip_of_rejects_addresses_outside_subnet() {
        let base = Ipv4Cidr::default();
        assert!(ip_of(255, &base).is_ok());
        assert_eq!(
            ip_of(256, &base),
            Err(PolicyError::AddressOutOfRange { node: 256, base })
        );
        assert!(ip_of(0, &base).is_err());
        assert!(ip_of(u32::MAX, &"255.0.0.0/8".parse().unwrap()).is_err());
    }

    #[test]
    fn test_addresses_are_injective() {
        let base: Ipv4Cidr = "10.0.0.0/8".parse().unwrap();
        let mut rng = fastrand::Rng::with_seed(42);
        let ids: HashSet<NodeId> = (0..2_000).map(|_| rng.u32(1..0x00ff_ffff)).collect();

        let macs: HashSet<_> = ids.iter().map(|&id| mac_of(id)).collect();
        let ips: HashSet<_> = ids.iter().map(|&id| ip_of(id, &base).unwrap()).collect();

        assert_eq!(macs.len(), ids.len());
        assert_eq!(ips.len(), ids.len());
    }
}
