//! ARP request/reply and gratuitous-ARP synthesis.

use opflex_types::{Ipv4Address, MacAddress};

use super::wire::{build_eth, ethertype};

const ARP_LEN: usize = 28;

pub mod opcode {
    pub const REQUEST: u16 = 1;
    pub const REPLY: u16 = 2;
}

#[derive(Debug, Clone, Copy)]
pub struct ArpView {
    pub opcode: u16,
    pub sender_mac: MacAddress,
    pub sender_ip: Ipv4Address,
    pub target_mac: MacAddress,
    pub target_ip: Ipv4Address,
}

pub fn parse_arp(payload: &[u8]) -> Option<ArpView> {
    if payload.len() < ARP_LEN {
        return None;
    }
    if u16::from_be_bytes([payload[0], payload[1]]) != 1 || u16::from_be_bytes([payload[2], payload[3]]) != ethertype::IP {
        return None;
    }
    Some(ArpView {
        opcode: u16::from_be_bytes([payload[6], payload[7]]),
        sender_mac: MacAddress::new(payload[8..14].try_into().unwrap()),
        sender_ip: Ipv4Address::from(std::net::Ipv4Addr::new(payload[14], payload[15], payload[16], payload[17])),
        target_mac: MacAddress::new(payload[18..24].try_into().unwrap()),
        target_ip: Ipv4Address::from(std::net::Ipv4Addr::new(payload[24], payload[25], payload[26], payload[27])),
    })
}

fn build_arp_payload(opcode: u16, sender_mac: MacAddress, sender_ip: Ipv4Address, target_mac: MacAddress, target_ip: Ipv4Address) -> Vec<u8> {
    let mut out = vec![0u8; ARP_LEN];
    out[0..2].copy_from_slice(&1u16.to_be_bytes());
    out[2..4].copy_from_slice(&ethertype::IP.to_be_bytes());
    out[4] = 6;
    out[5] = 4;
    out[6..8].copy_from_slice(&opcode.to_be_bytes());
    out[8..14].copy_from_slice(sender_mac.as_bytes());
    out[14..18].copy_from_slice(&sender_ip.octets());
    out[18..24].copy_from_slice(target_mac.as_bytes());
    out[24..28].copy_from_slice(&target_ip.octets());
    out
}

/// Builds a proxy-ARP reply to a request for `proxied_ip`, answering with
/// `proxied_mac` and addressed back to the requester.
pub fn build_arp_reply(request: &ArpView, proxied_mac: MacAddress, proxied_ip: Ipv4Address) -> Vec<u8> {
    let payload = build_arp_payload(opcode::REPLY, proxied_mac, proxied_ip, request.sender_mac, request.sender_ip);
    build_eth(request.sender_mac, proxied_mac, ethertype::ARP, &payload)
}

/// Builds a gratuitous ARP announcing `mac`/`ip`, broadcast on the wire.
pub fn build_gratuitous_arp(mac: MacAddress, ip: Ipv4Address) -> Vec<u8> {
    let payload = build_arp_payload(opcode::REQUEST, mac, ip, MacAddress::ZERO, ip);
    build_eth(MacAddress::BROADCAST, mac, ethertype::ARP, &payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arp_reply_roundtrip() {
        let requester = MacAddress::new([1, 1, 1, 1, 1, 1]);
        let req = ArpView {
            opcode: opcode::REQUEST,
            sender_mac: requester,
            sender_ip: Ipv4Address::new(10, 0, 0, 2),
            target_mac: MacAddress::ZERO,
            target_ip: Ipv4Address::new(10, 0, 0, 1),
        };
        let proxied_mac = MacAddress::new([2, 2, 2, 2, 2, 2]);
        let frame = build_arp_reply(&req, proxied_mac, Ipv4Address::new(10, 0, 0, 1));
        let eth = super::super::wire::parse_eth(&frame).unwrap();
        assert_eq!(eth.dst, requester);
        assert_eq!(eth.src, proxied_mac);
        let arp = parse_arp(eth.payload).unwrap();
        assert_eq!(arp.opcode, opcode::REPLY);
        assert_eq!(arp.sender_mac, proxied_mac);
        assert_eq!(arp.sender_ip, Ipv4Address::new(10, 0, 0, 1));
        assert_eq!(arp.target_mac, requester);
    }

    #[test]
    fn test_gratuitous_arp_is_broadcast() {
        let mac = MacAddress::new([3, 3, 3, 3, 3, 3]);
        let frame = build_gratuitous_arp(mac, Ipv4Address::new(10, 0, 0, 5));
        let eth = super::super::wire::parse_eth(&frame).unwrap();
        assert!(eth.dst.is_broadcast());
        let arp = parse_arp(eth.payload).unwrap();
        assert_eq!(arp.sender_ip, arp.target_ip);
    }
}
