//! ICMPv4/v6 echo reply synthesis and ICMPv4 error NAT-continuation rewrite.

use opflex_types::{Ipv4Address, MacAddress};

use super::wire::{build_eth, build_ipv4, build_ipv6, checksum16, ethertype, icmpv6_checksum, ip_proto, parse_ipv4, IPV4_HDR_LEN};

pub mod icmp4_type {
    pub const ECHO_REPLY: u8 = 0;
    pub const ECHO_REQUEST: u8 = 8;
}

pub mod icmp6_type {
    pub const ECHO_REQUEST: u8 = 128;
    pub const ECHO_REPLY: u8 = 129;
}

/// Swaps L2/L3 source/destination on an ICMPv4 echo request and flips the
/// type to reply, recomputing the (non-pseudo-header) ICMP checksum.
pub fn build_icmpv4_echo_reply(eth_src: MacAddress, eth_dst: MacAddress, ip: &super::wire::Ipv4View<'_>, icmp: &[u8]) -> Option<Vec<u8>> {
    if icmp.is_empty() || icmp[0] != icmp4_type::ECHO_REQUEST {
        return None;
    }
    let mut reply_icmp = icmp.to_vec();
    reply_icmp[0] = icmp4_type::ECHO_REPLY;
    reply_icmp[2..4].copy_from_slice(&[0, 0]);
    let csum = checksum16(&reply_icmp);
    reply_icmp[2..4].copy_from_slice(&csum.to_be_bytes());

    let mut ip_payload = build_ipv4(ip.dst, ip.src, ip_proto::ICMP, 64, 0, reply_icmp.len());
    ip_payload.extend_from_slice(&reply_icmp);
    Some(build_eth(eth_dst, eth_src, ethertype::IP, &ip_payload))
}

/// Swaps L2/L3 source/destination on an ICMPv6 echo request and flips the
/// type to reply, recomputing the checksum over the v6 pseudo-header.
pub fn build_icmpv6_echo_reply(eth_src: MacAddress, eth_dst: MacAddress, ip: &super::wire::Ipv6View<'_>, icmp6: &[u8]) -> Option<Vec<u8>> {
    if icmp6.is_empty() || icmp6[0] != icmp6_type::ECHO_REQUEST {
        return None;
    }
    let mut reply = icmp6.to_vec();
    reply[0] = icmp6_type::ECHO_REPLY;
    reply[2..4].copy_from_slice(&[0, 0]);
    let csum = icmpv6_checksum(ip.dst, ip.src, ip_proto::ICMPV6, &reply);
    reply[2..4].copy_from_slice(&csum.to_be_bytes());

    let mut ip_payload = build_ipv6(ip.dst, ip.src, ip_proto::ICMPV6, 64, reply.len());
    ip_payload.extend_from_slice(&reply);
    Some(build_eth(eth_dst, eth_src, ethertype::IPV6, &ip_payload))
}

/// Rewrites an ICMPv4 error datagram for NAT continuation: the outer
/// destination (currently the endpoint's floating IP) becomes its mapped
/// IP, and the embedded original datagram's source (the floating IP, as
/// seen beyond the NAT boundary) is rewritten back to the mapped IP too, so
/// the endpoint recognizes the error as belonging to its own connection.
/// Both IP header checksums and the ICMP checksum are recomputed.
pub fn rewrite_icmp_error_inner_ip(outer_ip_payload: &[u8], floating_ip: Ipv4Address, mapped_ip: Ipv4Address) -> Option<Vec<u8>> {
    let outer = parse_ipv4(outer_ip_payload)?;
    let icmp = outer.payload;
    if icmp.len() < 8 + IPV4_HDR_LEN {
        return None;
    }

    let mut new_outer = build_ipv4(outer.src, mapped_ip, outer.proto, 64, 0, icmp.len());
    let mut new_icmp = icmp.to_vec();

    // Embedded original IP header starts at byte 8 of the ICMP message.
    let inner_start = 8;
    if new_icmp[inner_start + 12..inner_start + 16] == floating_ip.octets() {
        new_icmp[inner_start + 12..inner_start + 16].copy_from_slice(&mapped_ip.octets());
        // Recompute the embedded IP header's own checksum.
        new_icmp[inner_start + 10..inner_start + 12].copy_from_slice(&[0, 0]);
        let inner_ihl = ((new_icmp[inner_start] & 0x0f) as usize) * 4;
        let inner_csum = checksum16(&new_icmp[inner_start..inner_start + inner_ihl]);
        new_icmp[inner_start + 10..inner_start + 12].copy_from_slice(&inner_csum.to_be_bytes());
    }

    new_icmp[2..4].copy_from_slice(&[0, 0]);
    let icmp_csum = checksum16(&new_icmp);
    new_icmp[2..4].copy_from_slice(&icmp_csum.to_be_bytes());

    new_outer.extend_from_slice(&new_icmp);
    Some(new_outer)
}
