//! DHCPv4 option parsing and reply synthesis.

use std::collections::HashMap;

use opflex_types::{Ipv4Address, MacAddress};

use super::wire::{build_eth, build_ipv4, build_udp, ethertype, ip_proto};
use crate::policy::types::Dhcp4Config;

const MAGIC_COOKIE: [u8; 4] = [99, 130, 83, 99];
const BOOTP_FIXED_LEN: usize = 236;
const CLIENT_PORT: u16 = 68;
const SERVER_PORT: u16 = 67;

pub mod msg_type {
    pub const DISCOVER: u8 = 1;
    pub const OFFER: u8 = 2;
    pub const REQUEST: u8 = 3;
    pub const ACK: u8 = 5;
    pub const NAK: u8 = 6;
}

#[derive(Debug, Clone)]
pub struct Dhcp4Request {
    pub xid: u32,
    pub client_mac: MacAddress,
    pub msg_type: u8,
    pub requested_ip: Option<Ipv4Address>,
}

/// Parses the UDP payload of a DHCPv4 client message (DISCOVER/REQUEST).
pub fn parse_dhcp4(udp_payload: &[u8]) -> Option<Dhcp4Request> {
    if udp_payload.len() < BOOTP_FIXED_LEN + 4 || udp_payload[236..240] != MAGIC_COOKIE {
        return None;
    }
    let xid = u32::from_be_bytes(udp_payload[4..8].try_into().unwrap());
    let chaddr: [u8; 6] = udp_payload[28..34].try_into().unwrap();
    let options = parse_options(&udp_payload[240..]);

    let msg_type = *options.get(&53)?.first()?;
    let requested_ip = options.get(&50).and_then(|bytes| {
        if bytes.len() == 4 {
            Some(Ipv4Address::from(std::net::Ipv4Addr::new(bytes[0], bytes[1], bytes[2], bytes[3])))
        } else {
            None
        }
    });

    Some(Dhcp4Request { xid, client_mac: MacAddress::new(chaddr), msg_type, requested_ip })
}

fn parse_options(data: &[u8]) -> HashMap<u8, Vec<u8>> {
    let mut options = HashMap::new();
    let mut i = 0;
    while i < data.len() {
        let code = data[i];
        if code == 0xff || code == 0x00 {
            i += 1;
            continue;
        }
        if i + 1 >= data.len() {
            break;
        }
        let len = data[i + 1] as usize;
        if i + 2 + len > data.len() {
            break;
        }
        options.insert(code, data[i + 2..i + 2 + len].to_vec());
        i += 2 + len;
    }
    options
}

/// Decides the reply type for a client message: NAK unless the requested IP
/// matches the endpoint's configured address, ACK for REQUEST and OFFER for
/// DISCOVER otherwise.
pub fn decide_reply_type(req: &Dhcp4Request, configured_ip: Option<Ipv4Address>) -> u8 {
    match req.msg_type {
        msg_type::DISCOVER => {
            if configured_ip.is_some() {
                msg_type::OFFER
            } else {
                msg_type::NAK
            }
        }
        msg_type::REQUEST => {
            if req.requested_ip.is_some() && req.requested_ip == configured_ip {
                msg_type::ACK
            } else {
                msg_type::NAK
            }
        }
        _ => msg_type::NAK,
    }
}

/// Builds the full Ethernet/IPv4/UDP/DHCP reply frame.
pub fn build_dhcp4_reply(
    req: &Dhcp4Request,
    reply_type: u8,
    server_mac: MacAddress,
    server_ip: Ipv4Address,
    cfg: &Dhcp4Config,
) -> Vec<u8> {
    let offered_ip = cfg.ip.unwrap_or(Ipv4Address::UNSPECIFIED);
    let mut bootp = vec![0u8; BOOTP_FIXED_LEN];
    bootp[0] = 2; // BOOTREPLY
    bootp[1] = 1; // ethernet
    bootp[2] = 6;
    bootp[4..8].copy_from_slice(&req.xid.to_be_bytes());
    if reply_type != msg_type::NAK {
        bootp[16..20].copy_from_slice(&offered_ip.octets());
    }
    bootp[20..24].copy_from_slice(&server_ip.octets());
    bootp[28..34].copy_from_slice(req.client_mac.as_bytes());

    let mut options = Vec::new();
    options.extend_from_slice(&MAGIC_COOKIE);
    options.extend_from_slice(&[53, 1, reply_type]);
    options.extend_from_slice(&[54, 4]);
    options.extend_from_slice(&server_ip.octets());
    if reply_type != msg_type::NAK {
        if let Some(prefix_len) = cfg.prefix_len {
            let mask = if prefix_len == 0 { 0u32 } else { u32::MAX << (32 - prefix_len) };
            options.extend_from_slice(&[1, 4]);
            options.extend_from_slice(&mask.to_be_bytes());
        }
        if !cfg.routers.is_empty() {
            options.push(3);
            options.push((cfg.routers.len() * 4) as u8);
            for r in &cfg.routers {
                if let opflex_types::IpAddress::V4(v4) = r {
                    options.extend_from_slice(&v4.octets());
                }
            }
        }
        if !cfg.dns.is_empty() {
            options.push(6);
            options.push((cfg.dns.len() * 4) as u8);
            for d in &cfg.dns {
                if let opflex_types::IpAddress::V4(v4) = d {
                    options.extend_from_slice(&v4.octets());
                }
            }
        }
        let lease = if cfg.lease_secs > 0 { cfg.lease_secs } else { 86400 };
        options.extend_from_slice(&[51, 4]);
        options.extend_from_slice(&lease.to_be_bytes());
    }
    options.push(0xff);

    let mut dhcp = bootp;
    dhcp.extend_from_slice(&options);

    let udp = build_udp(SERVER_PORT, CLIENT_PORT, &dhcp, server_ip, Ipv4Address::BROADCAST);
    let mut ip_payload = build_ipv4(server_ip, Ipv4Address::BROADCAST, ip_proto::UDP, 64, 0, udp.len());
    ip_payload.extend_from_slice(&udp);
    build_eth(MacAddress::BROADCAST, server_mac, ethertype::IP, &ip_payload)
}
