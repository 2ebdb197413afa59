//! Minimal byte-level header parsing/building for the packet classes the
//! Packet-In Handler synthesizes replies for.
//!
//! Packets handed to this module have already had any 802.1Q tag stripped
//! by the pipeline (VLAN membership is carried in the OpenFlow match, not
//! re-derived from the wire payload), so every frame here starts with a
//! plain 14-byte Ethernet header.

use opflex_types::{IpAddress, Ipv4Address, Ipv6Address, MacAddress};

pub const ETH_HDR_LEN: usize = 14;
pub const IPV4_HDR_LEN: usize = 20;
pub const IPV6_HDR_LEN: usize = 40;

pub mod ethertype {
    pub const IP: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const IPV6: u16 = 0x86dd;
}

pub mod ip_proto {
    pub const ICMP: u8 = 1;
    pub const UDP: u8 = 17;
    pub const ICMPV6: u8 = 58;
}

/// A parsed Ethernet header plus a slice of whatever follows it.
#[derive(Debug, Clone, Copy)]
pub struct EthView<'a> {
    pub dst: MacAddress,
    pub src: MacAddress,
    pub ethertype: u16,
    pub payload: &'a [u8],
}

pub fn parse_eth(data: &[u8]) -> Option<EthView<'_>> {
    if data.len() < ETH_HDR_LEN {
        return None;
    }
    Some(EthView {
        dst: MacAddress::new(data[0..6].try_into().unwrap()),
        src: MacAddress::new(data[6..12].try_into().unwrap()),
        ethertype: u16::from_be_bytes([data[12], data[13]]),
        payload: &data[ETH_HDR_LEN..],
    })
}

pub fn build_eth(dst: MacAddress, src: MacAddress, ethertype: u16, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(ETH_HDR_LEN + payload.len());
    out.extend_from_slice(dst.as_bytes());
    out.extend_from_slice(src.as_bytes());
    out.extend_from_slice(&ethertype.to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Internet checksum (RFC 1071): ones'-complement sum of 16-bit words.
pub fn checksum16(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut chunks = data.chunks_exact(2);
    for chunk in &mut chunks {
        sum += u16::from_be_bytes([chunk[0], chunk[1]]) as u32;
    }
    if let [last] = chunks.remainder() {
        sum += (*last as u32) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

#[derive(Debug, Clone, Copy)]
pub struct Ipv4View<'a> {
    pub src: Ipv4Address,
    pub dst: Ipv4Address,
    pub proto: u8,
    pub ttl: u8,
    pub ihl_bytes: usize,
    pub total_len: u16,
    pub payload: &'a [u8],
}

pub fn parse_ipv4(data: &[u8]) -> Option<Ipv4View<'_>> {
    if data.len() < IPV4_HDR_LEN {
        return None;
    }
    let ihl_bytes = ((data[0] & 0x0f) as usize) * 4;
    if data.len() < ihl_bytes {
        return None;
    }
    let total_len = u16::from_be_bytes([data[2], data[3]]);
    Some(Ipv4View {
        src: Ipv4Address::from(std::net::Ipv4Addr::new(data[12], data[13], data[14], data[15])),
        dst: Ipv4Address::from(std::net::Ipv4Addr::new(data[16], data[17], data[18], data[19])),
        proto: data[9],
        ttl: data[8],
        ihl_bytes,
        total_len,
        payload: &data[ihl_bytes..],
    })
}

/// Builds a bare (no-options) IPv4 header with a correct checksum.
#[allow(clippy::too_many_arguments)]
pub fn build_ipv4(src: Ipv4Address, dst: Ipv4Address, proto: u8, ttl: u8, id: u16, payload_len: usize) -> Vec<u8> {
    let mut hdr = vec![0u8; IPV4_HDR_LEN];
    hdr[0] = 0x45;
    hdr[1] = 0x00;
    let total_len = (IPV4_HDR_LEN + payload_len) as u16;
    hdr[2..4].copy_from_slice(&total_len.to_be_bytes());
    hdr[4..6].copy_from_slice(&id.to_be_bytes());
    hdr[6] = 0x40; // don't fragment
    hdr[7] = 0x00;
    hdr[8] = ttl;
    hdr[9] = proto;
    hdr[10..12].copy_from_slice(&[0, 0]);
    hdr[12..16].copy_from_slice(&src.octets());
    hdr[16..20].copy_from_slice(&dst.octets());
    let csum = checksum16(&hdr);
    hdr[10..12].copy_from_slice(&csum.to_be_bytes());
    hdr
}

#[derive(Debug, Clone, Copy)]
pub struct Ipv6View<'a> {
    pub src: Ipv6Address,
    pub dst: Ipv6Address,
    pub next_header: u8,
    pub hop_limit: u8,
    pub payload: &'a [u8],
}

pub fn parse_ipv6(data: &[u8]) -> Option<Ipv6View<'_>> {
    if data.len() < IPV6_HDR_LEN {
        return None;
    }
    let src: [u8; 16] = data[8..24].try_into().unwrap();
    let dst: [u8; 16] = data[24..40].try_into().unwrap();
    Some(Ipv6View {
        src: Ipv6Address::from(std::net::Ipv6Addr::from(src)),
        dst: Ipv6Address::from(std::net::Ipv6Addr::from(dst)),
        next_header: data[6],
        hop_limit: data[7],
        payload: &data[IPV6_HDR_LEN..],
    })
}

pub fn build_ipv6(src: Ipv6Address, dst: Ipv6Address, next_header: u8, hop_limit: u8, payload_len: usize) -> Vec<u8> {
    let mut hdr = vec![0u8; IPV6_HDR_LEN];
    hdr[0] = 0x60;
    let plen = payload_len as u16;
    hdr[4..6].copy_from_slice(&plen.to_be_bytes());
    hdr[6] = next_header;
    hdr[7] = hop_limit;
    hdr[8..24].copy_from_slice(&src.octets());
    hdr[24..40].copy_from_slice(&dst.octets());
    hdr
}

/// RFC 2460 pseudo-header checksum, shared by ICMPv6 and UDP/TCP over IPv6.
pub fn icmpv6_checksum(src: Ipv6Address, dst: Ipv6Address, next_header: u8, payload: &[u8]) -> u16 {
    let mut pseudo = Vec::with_capacity(40 + payload.len());
    pseudo.extend_from_slice(&src.octets());
    pseudo.extend_from_slice(&dst.octets());
    pseudo.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    pseudo.extend_from_slice(&[0, 0, 0]);
    pseudo.push(next_header);
    pseudo.extend_from_slice(payload);
    checksum16(&pseudo)
}

/// Builds an IPv4 pseudo-header checksum for UDP, per RFC 768.
pub fn ipv4_udp_checksum(src: Ipv4Address, dst: Ipv4Address, payload: &[u8]) -> u16 {
    let mut pseudo = Vec::with_capacity(12 + payload.len());
    pseudo.extend_from_slice(&src.octets());
    pseudo.extend_from_slice(&dst.octets());
    pseudo.push(0);
    pseudo.push(ip_proto::UDP);
    pseudo.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    pseudo.extend_from_slice(payload);
    checksum16(&pseudo)
}

pub fn build_udp(src_port: u16, dst_port: u16, payload: &[u8], src: Ipv4Address, dst: Ipv4Address) -> Vec<u8> {
    let mut out = vec![0u8; 8 + payload.len()];
    out[0..2].copy_from_slice(&src_port.to_be_bytes());
    out[2..4].copy_from_slice(&dst_port.to_be_bytes());
    out[4..6].copy_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    out[8..].copy_from_slice(payload);
    let csum = ipv4_udp_checksum(src, dst, &out);
    out[6..8].copy_from_slice(&csum.to_be_bytes());
    out
}

pub fn build_udp6(src_port: u16, dst_port: u16, payload: &[u8], src: Ipv6Address, dst: Ipv6Address) -> Vec<u8> {
    let mut out = vec![0u8; 8 + payload.len()];
    out[0..2].copy_from_slice(&src_port.to_be_bytes());
    out[2..4].copy_from_slice(&dst_port.to_be_bytes());
    out[4..6].copy_from_slice(&((8 + payload.len()) as u16).to_be_bytes());
    out[8..].copy_from_slice(payload);
    let csum = icmpv6_checksum(src, dst, ip_proto::UDP, &out);
    out[6..8].copy_from_slice(&csum.to_be_bytes());
    out
}

pub fn std_ip4(addr: Ipv4Address) -> std::net::Ipv4Addr {
    addr.inner()
}

pub fn to_ip_address(addr: std::net::IpAddr) -> IpAddress {
    match addr {
        std::net::IpAddr::V4(v4) => IpAddress::V4(v4.into()),
        std::net::IpAddr::V6(v6) => IpAddress::V6(v6.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eth_roundtrip() {
        let dst = MacAddress::new([1, 2, 3, 4, 5, 6]);
        let src = MacAddress::new([6, 5, 4, 3, 2, 1]);
        let frame = build_eth(dst, src, ethertype::IP, &[0xaa, 0xbb]);
        let view = parse_eth(&frame).unwrap();
        assert_eq!(view.dst, dst);
        assert_eq!(view.src, src);
        assert_eq!(view.ethertype, ethertype::IP);
        assert_eq!(view.payload, &[0xaa, 0xbb]);
    }

    #[test]
    fn test_ipv4_checksum_valid() {
        let hdr = build_ipv4(Ipv4Address::new(10, 0, 0, 1), Ipv4Address::new(10, 0, 0, 2), ip_proto::ICMP, 64, 0, 0);
        assert_eq!(checksum16(&hdr), 0);
    }

    #[test]
    fn test_ipv4_roundtrip() {
        let hdr = build_ipv4(Ipv4Address::new(10, 0, 0, 1), Ipv4Address::new(10, 0, 0, 2), ip_proto::UDP, 64, 7, 4);
        let mut full = hdr.clone();
        full.extend_from_slice(&[1, 2, 3, 4]);
        let view = parse_ipv4(&full).unwrap();
        assert_eq!(view.src, Ipv4Address::new(10, 0, 0, 1));
        assert_eq!(view.dst, Ipv4Address::new(10, 0, 0, 2));
        assert_eq!(view.proto, ip_proto::UDP);
        assert_eq!(view.payload, &[1, 2, 3, 4]);
    }
}
