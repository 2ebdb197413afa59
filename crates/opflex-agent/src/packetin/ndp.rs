//! Neighbor Discovery: NS -> NA and RS -> RA synthesis, plus unsolicited NA
//! for endpoint-advertisement duty (C9).

use opflex_types::{Ipv6Address, MacAddress};

use super::wire::{build_eth, build_ipv6, ethertype, icmpv6_checksum, ip_proto, IPV6_HDR_LEN};
use crate::policy::types::Subnet;

pub mod icmp6_type {
    pub const ROUTER_SOLICIT: u8 = 133;
    pub const ROUTER_ADVERT: u8 = 134;
    pub const NEIGHBOR_SOLICIT: u8 = 135;
    pub const NEIGHBOR_ADVERT: u8 = 136;
}

const NA_FLAG_ROUTER: u8 = 0x80;
const NA_FLAG_SOLICITED: u8 = 0x40;
const NA_FLAG_OVERRIDE: u8 = 0x20;

/// Option type 2: target link-layer address (used on NA/RA).
const OPT_TARGET_LL_ADDR: u8 = 2;

#[derive(Debug, Clone, Copy)]
pub struct NeighborSolicit {
    pub target: Ipv6Address,
}

pub fn parse_neighbor_solicit(icmp6: &[u8]) -> Option<NeighborSolicit> {
    if icmp6.len() < 24 || icmp6[0] != icmp6_type::NEIGHBOR_SOLICIT {
        return None;
    }
    let target: [u8; 16] = icmp6[8..24].try_into().unwrap();
    Some(NeighborSolicit { target: Ipv6Address::from(std::net::Ipv6Addr::from(target)) })
}

fn build_icmp6(icmp_type: u8, code: u8, type_specific: &[u8], options: &[u8], src: Ipv6Address, dst: Ipv6Address) -> Vec<u8> {
    let mut body = vec![icmp_type, code, 0, 0];
    body.extend_from_slice(type_specific);
    body.extend_from_slice(options);
    let csum = icmpv6_checksum(src, dst, ip_proto::ICMPV6, &body);
    body[2..4].copy_from_slice(&csum.to_be_bytes());
    body
}

fn target_ll_option(mac: MacAddress) -> [u8; 8] {
    let mut opt = [0u8; 8];
    opt[0] = OPT_TARGET_LL_ADDR;
    opt[1] = 1; // length in 8-byte units
    opt[2..8].copy_from_slice(mac.as_bytes());
    opt
}

/// Builds a Neighbor Advertisement for `target` owned by `target_mac`,
/// replying to the solicitation from `requester_mac`/`requester_ip`.
pub fn build_neighbor_advertisement(
    target: Ipv6Address,
    target_mac: MacAddress,
    requester_mac: MacAddress,
    requester_ip: Ipv6Address,
    router: bool,
) -> Vec<u8> {
    let mut flags = NA_FLAG_SOLICITED | NA_FLAG_OVERRIDE;
    if router {
        flags |= NA_FLAG_ROUTER;
    }
    let type_specific = {
        let mut ts = vec![flags, 0, 0, 0];
        ts.extend_from_slice(&target.octets());
        ts
    };
    let icmp6 = build_icmp6(icmp6_type::NEIGHBOR_ADVERT, 0, &type_specific, &target_ll_option(target_mac), target, requester_ip);
    let ip_hdr = build_ipv6(target, requester_ip, ip_proto::ICMPV6, 255, icmp6.len());
    let mut ip_payload = ip_hdr;
    ip_payload.extend_from_slice(&icmp6);
    build_eth(requester_mac, target_mac, ethertype::IPV6, &ip_payload)
}

/// Builds an unsolicited NA (gratuitous, destined to the all-nodes
/// multicast address) for endpoint-advertisement duty.
pub fn build_unsolicited_na(target: Ipv6Address, target_mac: MacAddress) -> Vec<u8> {
    let all_nodes = Ipv6Address::from("ff02::1".parse::<std::net::Ipv6Addr>().unwrap());
    build_neighbor_advertisement(target, target_mac, MacAddress::new([0x33, 0x33, 0x00, 0x00, 0x00, 0x01]), all_nodes, false)
}

/// Builds a Router Advertisement listing `subnets` as on-link prefixes.
pub fn build_router_advertisement(
    router_mac: MacAddress,
    router_ip: Ipv6Address,
    requester_mac: MacAddress,
    requester_ip: Ipv6Address,
    subnets: &[Subnet],
) -> Vec<u8> {
    let type_specific = [64, 0, 0, 30, 0, 0, 0x1, 0xf4]; // cur_hop_limit=64, flags=0, lifetime=1800s, reachable=0, retrans=500ms
    let mut options = target_ll_option(router_mac).to_vec();
    for subnet in subnets {
        let opflex_types::IpAddress::V6(addr) = subnet.address else { continue };
        let mut opt = vec![0u8; 32];
        opt[0] = 3; // prefix information
        opt[1] = 4; // 32 bytes / 8
        opt[2] = subnet.prefix_len;
        opt[3] = 0xc0; // on-link + autonomous
        opt[4..8].copy_from_slice(&2_592_000u32.to_be_bytes()); // valid lifetime
        opt[8..12].copy_from_slice(&604_800u32.to_be_bytes()); // preferred lifetime
        opt[16..32].copy_from_slice(&addr.octets());
        options.extend_from_slice(&opt);
    }
    let icmp6 = build_icmp6(icmp6_type::ROUTER_ADVERT, 0, &type_specific, &options, router_ip, requester_ip);
    let ip_hdr = build_ipv6(router_ip, requester_ip, ip_proto::ICMPV6, 255, icmp6.len());
    let mut ip_payload = ip_hdr;
    ip_payload.extend_from_slice(&icmp6);
    build_eth(requester_mac, router_mac, ethertype::IPV6, &ip_payload)
}

pub fn icmp6_type_of(ipv6_payload: &[u8]) -> Option<u8> {
    let icmp6 = &ipv6_payload[IPV6_HDR_LEN..];
    icmp6.first().copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_neighbor_advertisement_sets_solicited_override() {
        let target = Ipv6Address::from("fe80::1".parse::<std::net::Ipv6Addr>().unwrap());
        let requester = Ipv6Address::from("fe80::2".parse::<std::net::Ipv6Addr>().unwrap());
        let frame = build_neighbor_advertisement(
            target,
            MacAddress::new([1, 2, 3, 4, 5, 6]),
            MacAddress::new([6, 5, 4, 3, 2, 1]),
            requester,
            true,
        );
        let eth = super::super::wire::parse_eth(&frame).unwrap();
        assert_eq!(eth.ethertype, ethertype::IPV6);
        let icmp6 = &eth.payload[IPV6_HDR_LEN..];
        assert_eq!(icmp6[0], icmp6_type::NEIGHBOR_ADVERT);
        assert_eq!(icmp6[4] & NA_FLAG_SOLICITED, NA_FLAG_SOLICITED);
        assert_eq!(icmp6[4] & NA_FLAG_ROUTER, NA_FLAG_ROUTER);
    }

    #[test]
    fn test_router_advertisement_carries_prefix() {
        let router_ip = Ipv6Address::from("fe80::1".parse::<std::net::Ipv6Addr>().unwrap());
        let requester = Ipv6Address::from("fe80::2".parse::<std::net::Ipv6Addr>().unwrap());
        let subnets = vec![Subnet {
            address: opflex_types::IpAddress::V6(Ipv6Address::from("2001:db8::".parse::<std::net::Ipv6Addr>().unwrap())),
            prefix_len: 64,
            virtual_router_ip: None,
        }];
        let frame = build_router_advertisement(
            MacAddress::new([1, 2, 3, 4, 5, 6]),
            router_ip,
            MacAddress::new([6, 5, 4, 3, 2, 1]),
            requester,
            &subnets,
        );
        let eth = super::super::wire::parse_eth(&frame).unwrap();
        let icmp6 = &eth.payload[IPV6_HDR_LEN..];
        assert_eq!(icmp6[0], icmp6_type::ROUTER_ADVERT);
        assert!(icmp6.len() > 16 + 32);
    }
}
