//! DHCPv6 option parsing and reply synthesis (SOLICIT/REQUEST -> ADVERTISE/REPLY).

use opflex_types::{Ipv6Address, MacAddress};

use super::wire::{build_eth, build_ipv6, build_udp6, ethertype, ip_proto};
use crate::policy::types::Dhcp6Config;

const CLIENT_PORT: u16 = 546;
const SERVER_PORT: u16 = 547;
/// A fixed 16-byte server DUID (DUID-LL-style, stable for this agent).
const SERVER_DUID: [u8; 16] = [0, 3, 0, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0];

pub mod msg_type {
    pub const SOLICIT: u8 = 1;
    pub const ADVERTISE: u8 = 2;
    pub const REQUEST: u8 = 3;
    pub const REPLY: u8 = 7;
}

mod opt {
    pub const CLIENT_ID: u16 = 1;
    pub const SERVER_ID: u16 = 2;
    pub const IA_NA: u16 = 3;
    pub const IA_TA: u16 = 4;
    pub const IA_ADDR: u16 = 5;
    pub const RAPID_COMMIT: u16 = 14;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IaKind {
    NonTemporary,
    Temporary,
}

#[derive(Debug, Clone)]
pub struct Dhcp6Request {
    pub msg_type: u8,
    pub transaction_id: [u8; 3],
    pub client_id: Vec<u8>,
    pub ia_id: Option<u32>,
    pub ia_kind: Option<IaKind>,
    pub rapid_commit: bool,
}

pub fn parse_dhcp6(udp_payload: &[u8]) -> Option<Dhcp6Request> {
    if udp_payload.len() < 4 {
        return None;
    }
    let msg_type = udp_payload[0];
    let transaction_id = [udp_payload[1], udp_payload[2], udp_payload[3]];
    let mut client_id = Vec::new();
    let mut ia_id = None;
    let mut ia_kind = None;
    let mut rapid_commit = false;

    let mut i = 4;
    while i + 4 <= udp_payload.len() {
        let code = u16::from_be_bytes([udp_payload[i], udp_payload[i + 1]]);
        let len = u16::from_be_bytes([udp_payload[i + 2], udp_payload[i + 3]]) as usize;
        let start = i + 4;
        if start + len > udp_payload.len() {
            break;
        }
        let data = &udp_payload[start..start + len];
        match code {
            opt::CLIENT_ID => client_id = data.to_vec(),
            opt::IA_NA if data.len() >= 4 => {
                ia_id = Some(u32::from_be_bytes(data[0..4].try_into().unwrap()));
                ia_kind = Some(IaKind::NonTemporary);
            }
            opt::IA_TA if data.len() >= 4 => {
                ia_id = Some(u32::from_be_bytes(data[0..4].try_into().unwrap()));
                ia_kind = Some(IaKind::Temporary);
            }
            opt::RAPID_COMMIT => rapid_commit = true,
            _ => {}
        }
        i = start + len;
    }

    Some(Dhcp6Request { msg_type, transaction_id, client_id, ia_id, ia_kind, rapid_commit })
}

fn encode_option(code: u16, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + data.len());
    out.extend_from_slice(&code.to_be_bytes());
    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    out.extend_from_slice(data);
    out
}

fn encode_ia_addr(addr: Ipv6Address) -> Vec<u8> {
    let mut data = Vec::with_capacity(24);
    data.extend_from_slice(&addr.octets());
    data.extend_from_slice(&3600u32.to_be_bytes()); // preferred lifetime
    data.extend_from_slice(&7200u32.to_be_bytes()); // valid lifetime
    encode_option(opt::IA_ADDR, &data)
}

/// Builds the ADVERTISE/REPLY response for a SOLICIT/REQUEST, listing the
/// endpoint's configured v6 addresses in an IA_NA (or IA_TA if that's what
/// the client asked for).
pub fn build_dhcp6_reply(
    req: &Dhcp6Request,
    link_local_mac: MacAddress,
    server_ip: Ipv6Address,
    client_mac: MacAddress,
    client_ip: Ipv6Address,
    cfg: &Dhcp6Config,
) -> Vec<u8> {
    let reply_type = if req.msg_type == msg_type::SOLICIT && req.rapid_commit { msg_type::REPLY } else if req.msg_type == msg_type::SOLICIT { msg_type::ADVERTISE } else { msg_type::REPLY };

    let mut body = vec![reply_type, req.transaction_id[0], req.transaction_id[1], req.transaction_id[2]];
    body.extend_from_slice(&encode_option(opt::CLIENT_ID, &req.client_id));
    body.extend_from_slice(&encode_option(opt::SERVER_ID, &SERVER_DUID));
    if reply_type == msg_type::REPLY && req.rapid_commit {
        body.extend_from_slice(&encode_option(opt::RAPID_COMMIT, &[]));
    }

    let mut ia_data = Vec::new();
    if let Some(iaid) = req.ia_id {
        ia_data.extend_from_slice(&iaid.to_be_bytes());
        ia_data.extend_from_slice(&3600u32.to_be_bytes()); // T1
        ia_data.extend_from_slice(&5400u32.to_be_bytes()); // T2
        for addr in &cfg.addresses {
            if let opflex_types::IpAddress::V6(v6) = addr {
                ia_data.extend_from_slice(&encode_ia_addr(*v6));
            }
        }
        let ia_code = match req.ia_kind {
            Some(IaKind::Temporary) => opt::IA_TA,
            _ => opt::IA_NA,
        };
        body.extend_from_slice(&encode_option(ia_code, &ia_data));
    }

    let udp = build_udp6(SERVER_PORT, CLIENT_PORT, &body, server_ip, client_ip);
    let mut ip_payload = build_ipv6(server_ip, client_ip, ip_proto::UDP, 64, udp.len());
    ip_payload.extend_from_slice(&udp);
    build_eth(client_mac, link_local_mac, ethertype::IPV6, &ip_payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_solicit(rapid_commit: bool) -> Vec<u8> {
        let mut msg = vec![msg_type::SOLICIT, 0, 1, 2];
        msg.extend_from_slice(&encode_option(opt::CLIENT_ID, &[1, 2, 3, 4]));
        let mut ia_na = vec![0, 0, 0, 7];
        ia_na.extend_from_slice(&0u32.to_be_bytes());
        ia_na.extend_from_slice(&0u32.to_be_bytes());
        msg.extend_from_slice(&encode_option(opt::IA_NA, &ia_na));
        if rapid_commit {
            msg.extend_from_slice(&encode_option(opt::RAPID_COMMIT, &[]));
        }
        msg
    }

    #[test]
    fn test_parse_solicit_with_ia_na() {
        let raw = sample_solicit(false);
        let req = parse_dhcp6(&raw).unwrap();
        assert_eq!(req.msg_type, msg_type::SOLICIT);
        assert_eq!(req.ia_id, Some(7));
        assert_eq!(req.ia_kind, Some(IaKind::NonTemporary));
        assert!(!req.rapid_commit);
    }

    #[test]
    fn test_parse_rapid_commit() {
        let raw = sample_solicit(true);
        let req = parse_dhcp6(&raw).unwrap();
        assert!(req.rapid_commit);
    }

    #[test]
    fn test_build_reply_is_advertise_without_rapid_commit() {
        let req = parse_dhcp6(&sample_solicit(false)).unwrap();
        let cfg = Dhcp6Config {
            addresses: vec!["2001:db8::5".parse().unwrap()],
            dns: vec![],
        };
        let frame = build_dhcp6_reply(
            &req,
            MacAddress::new([9; 6]),
            "fe80::1".parse().unwrap(),
            MacAddress::new([1; 6]),
            "fe80::2".parse().unwrap(),
            &cfg,
        );
        assert!(!frame.is_empty());
    }

    #[test]
    fn test_build_reply_is_reply_with_rapid_commit() {
        let req = parse_dhcp6(&sample_solicit(true)).unwrap();
        let cfg = Dhcp6Config { addresses: vec![], dns: vec![] };
        let frame = build_dhcp6_reply(
            &req,
            MacAddress::new([9; 6]),
            "fe80::1".parse().unwrap(),
            MacAddress::new([1; 6]),
            "fe80::2".parse().unwrap(),
            &cfg,
        );
        assert!(!frame.is_empty());
    }
}
