//! C7 Packet-In Handler: dispatches `OFPT_PACKET_IN` messages by reserved
//! cookie class to the ARP/ND/DHCP/ICMP/VIP synthesis routines in this
//! module and packet-outs the resulting reply back to the switch.

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use log::{debug, warn};

use opflex_core::Orch;
use opflex_ovs::{PacketIn, SwitchConnection};
use opflex_types::{Cookie, CookieClass, IpAddress, MacAddress, OfPort};

use crate::policy::types::{Endpoint, Subnet};
use crate::portmap::PortMapper;

use super::{arp, dhcp4, dhcp6, icmp, ndp, vip, wire};

/// Read-only policy lookups the handler needs to synthesize replies. A
/// narrow seam so tests can substitute fixtures for a live MODB resolver.
pub trait PolicyLookup: Send + Sync {
    /// The MAC address that should answer for `target_ip` in a proxy
    /// ARP/ND reply: the endpoint or subnet virtual router that owns it.
    fn resolve_target_mac(&self, target_ip: IpAddress) -> Option<MacAddress>;

    /// The endpoint known to own `client_mac`.
    fn endpoint_by_mac(&self, client_mac: MacAddress) -> Option<Endpoint>;

    /// The mapped (private) address behind `floating_ip`, for ICMP-error
    /// NAT continuation.
    fn mapped_ip_for_floating(&self, floating_ip: IpAddress) -> Option<IpAddress>;

    /// Endpoints whose interface matches `iface_name`, for VIP-announcement
    /// detection.
    fn endpoints_on_iface(&self, iface_name: &str) -> Vec<Endpoint>;

    /// Subnets reachable on `iface_name`, for Router Advertisement replies.
    fn subnets_on_iface(&self, iface_name: &str) -> Vec<Subnet>;
}

/// Dispatches packet-ins by reserved cookie class and packet-outs the
/// synthesized reply, if any, back out the ingress port.
pub struct PacketInHandler<C: SwitchConnection> {
    conn: Arc<C>,
    ports: Arc<RwLock<PortMapper>>,
    policy: Arc<dyn PolicyLookup>,
    inbox: VecDeque<PacketIn>,
}

impl<C: SwitchConnection> PacketInHandler<C> {
    pub fn new(conn: Arc<C>, ports: Arc<RwLock<PortMapper>>, policy: Arc<dyn PolicyLookup>) -> Self {
        Self { conn, ports, policy, inbox: VecDeque::new() }
    }

    /// Queues a packet delivered by the switch connection's packet-in
    /// stream for the next `do_task()` sweep.
    pub fn handle_packet_in(&mut self, pkt: PacketIn) {
        self.inbox.push_back(pkt);
    }

    fn ingress_iface(&self, in_port: u32) -> Option<String> {
        self.ports.read().unwrap().find_name(OfPort::new(in_port)).map(str::to_string)
    }

    fn process(&self, pkt: &PacketIn) -> Option<Vec<u8>> {
        let cookie = Cookie::from_raw(pkt.cookie);
        let Some(eth) = wire::parse_eth(&pkt.data) else {
            warn!("packet-in with undersized Ethernet frame on port {}, dropping", pkt.in_port);
            return None;
        };
        let iface = self.ingress_iface(pkt.in_port);

        match cookie.reserved_class() {
            Some(c) if c == CookieClass::NeighDisc as u32 => self.handle_neigh_disc(&eth, iface.as_deref()),
            Some(c) if c == CookieClass::DhcpV4 as u32 => self.handle_dhcp4(&eth),
            Some(c) if c == CookieClass::DhcpV6 as u32 => self.handle_dhcp6(&eth),
            Some(c) if c == CookieClass::IcmpEchoV4 as u32 || c == CookieClass::IcmpEchoV6 as u32 => self.handle_icmp_echo(&eth),
            Some(c) if c == CookieClass::IcmpErrorV4 as u32 => self.handle_icmp_error(&eth),
            Some(c) if c == CookieClass::VirtualIpV4 as u32 || c == CookieClass::VirtualIpV6 as u32 => {
                self.handle_vip_announcement(&eth, iface.as_deref());
                None
            }
            _ => {
                debug!("packet-in on port {} carries an unhandled cookie {cookie}", pkt.in_port);
                None
            }
        }
    }

    fn handle_neigh_disc(&self, eth: &wire::EthView<'_>, iface: Option<&str>) -> Option<Vec<u8>> {
        match eth.ethertype {
            wire::ethertype::ARP => {
                let req = arp::parse_arp(eth.payload)?;
                if req.opcode != arp::opcode::REQUEST {
                    return None;
                }
                let mac = self.policy.resolve_target_mac(IpAddress::V4(req.target_ip))?;
                Some(arp::build_arp_reply(&req, mac, req.target_ip))
            }
            wire::ethertype::IPV6 => {
                let ip = wire::parse_ipv6(eth.payload)?;
                match ip.payload.first().copied() {
                    Some(ndp::icmp6_type::NEIGHBOR_SOLICIT) => {
                        let ns = ndp::parse_neighbor_solicit(ip.payload)?;
                        let mac = self.policy.resolve_target_mac(IpAddress::V6(ns.target))?;
                        Some(ndp::build_neighbor_advertisement(ns.target, mac, eth.src, ip.src, false))
                    }
                    Some(ndp::icmp6_type::ROUTER_SOLICIT) => {
                        let iface = iface?;
                        let subnets = self.policy.subnets_on_iface(iface);
                        if subnets.is_empty() {
                            return None;
                        }
                        let router_mac = self.policy.resolve_target_mac(IpAddress::V6(ip.dst))?;
                        Some(ndp::build_router_advertisement(router_mac, ip.dst, eth.src, ip.src, &subnets))
                    }
                    _ => None,
                }
            }
            _ => None,
        }
    }

    fn handle_dhcp4(&self, eth: &wire::EthView<'_>) -> Option<Vec<u8>> {
        let ip = wire::parse_ipv4(eth.payload)?;
        if ip.proto != wire::ip_proto::UDP || ip.payload.len() < 8 {
            return None;
        }
        let req = dhcp4::parse_dhcp4(&ip.payload[8..])?;
        let endpoint = self.policy.endpoint_by_mac(req.client_mac)?;
        let cfg = endpoint.dhcp4.as_ref()?;
        let configured_v4 = cfg.ip.and_then(|addr| match addr {
            IpAddress::V4(v4) => Some(v4),
            IpAddress::V6(_) => None,
        });
        let server_ip = cfg.routers.iter().find_map(|r| match r {
            IpAddress::V4(v4) => Some(*v4),
            IpAddress::V6(_) => None,
        })?;
        let reply_type = dhcp4::decide_reply_type(&req, configured_v4);
        Some(dhcp4::build_dhcp4_reply(&req, reply_type, eth.dst, server_ip, cfg))
    }

    fn handle_dhcp6(&self, eth: &wire::EthView<'_>) -> Option<Vec<u8>> {
        let ip = wire::parse_ipv6(eth.payload)?;
        if ip.next_header != wire::ip_proto::UDP || ip.payload.len() < 8 {
            return None;
        }
        let req = dhcp6::parse_dhcp6(&ip.payload[8..])?;
        let client_mac = eth.src;
        let endpoint = self.policy.endpoint_by_mac(client_mac)?;
        let cfg = endpoint.dhcp6.as_ref()?;
        Some(dhcp6::build_dhcp6_reply(&req, eth.dst, ip.dst, client_mac, ip.src, cfg))
    }

    fn handle_icmp_echo(&self, eth: &wire::EthView<'_>) -> Option<Vec<u8>> {
        match eth.ethertype {
            wire::ethertype::IP => {
                let ip = wire::parse_ipv4(eth.payload)?;
                if ip.proto != wire::ip_proto::ICMP {
                    return None;
                }
                icmp::build_icmpv4_echo_reply(eth.dst, eth.src, &ip, ip.payload)
            }
            wire::ethertype::IPV6 => {
                let ip = wire::parse_ipv6(eth.payload)?;
                if ip.next_header != wire::ip_proto::ICMPV6 {
                    return None;
                }
                icmp::build_icmpv6_echo_reply(eth.dst, eth.src, &ip, ip.payload)
            }
            _ => None,
        }
    }

    fn handle_icmp_error(&self, eth: &wire::EthView<'_>) -> Option<Vec<u8>> {
        let ip = wire::parse_ipv4(eth.payload)?;
        if ip.proto != wire::ip_proto::ICMP {
            return None;
        }
        let mapped = self.policy.mapped_ip_for_floating(IpAddress::V4(ip.dst))?;
        let IpAddress::V4(mapped_v4) = mapped else { return None };
        let rewritten = icmp::rewrite_icmp_error_inner_ip(eth.payload, ip.dst, mapped_v4)?;
        let dst_mac = self.policy.resolve_target_mac(mapped)?;
        Some(wire::build_eth(dst_mac, eth.dst, wire::ethertype::IP, &rewritten))
    }

    fn handle_vip_announcement(&self, eth: &wire::EthView<'_>, iface: Option<&str>) {
        let Some(iface) = iface else { return };
        let announced = match eth.ethertype {
            wire::ethertype::ARP => arp::parse_arp(eth.payload).map(|a| IpAddress::V4(a.sender_ip)),
            wire::ethertype::IPV6 => wire::parse_ipv6(eth.payload).map(|ip| IpAddress::V6(ip.src)),
            _ => None,
        };
        let Some(announced_ip) = announced else { return };
        let endpoints = self.policy.endpoints_on_iface(iface);
        if let Some(hit) = vip::detect_vip_announcement(&endpoints, iface, announced_ip) {
            log::info!("VIP announcement: endpoint {} owns {}", hit.endpoint_uuid, hit.announced_ip);
        }
    }
}

#[async_trait]
impl<C: SwitchConnection + 'static> Orch for PacketInHandler<C> {
    fn name(&self) -> &str {
        "PacketInHandler"
    }

    async fn do_task(&mut self) {
        while let Some(pkt) = self.inbox.pop_front() {
            if let Some(frame) = self.process(&pkt) {
                if let Err(err) = self.conn.packet_out(pkt.in_port, &frame).await {
                    warn!("packet-out on port {} failed: {err}", pkt.in_port);
                }
            }
        }
    }

    fn has_pending_tasks(&self) -> bool {
        !self.inbox.is_empty()
    }

    fn dump_pending_tasks(&self) -> Vec<String> {
        self.inbox.iter().map(|p| format!("packet-in port={} cookie={:#x}", p.in_port, p.cookie)).collect()
    }

    fn priority(&self) -> i32 {
        20
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::types::{Dhcp4Config, EndpointFlags};
    use opflex_ovs::conn::FakeConnection;
    use opflex_types::Ipv4Address;
    use std::sync::Mutex as StdMutex;

    struct FixturePolicy {
        endpoints: StdMutex<Vec<Endpoint>>,
        target_mac: MacAddress,
    }

    impl PolicyLookup for FixturePolicy {
        fn resolve_target_mac(&self, _target_ip: IpAddress) -> Option<MacAddress> {
            Some(self.target_mac)
        }
        fn endpoint_by_mac(&self, client_mac: MacAddress) -> Option<Endpoint> {
            self.endpoints.lock().unwrap().iter().find(|e| e.mac == Some(client_mac)).cloned()
        }
        fn mapped_ip_for_floating(&self, _floating_ip: IpAddress) -> Option<IpAddress> {
            None
        }
        fn endpoints_on_iface(&self, iface_name: &str) -> Vec<Endpoint> {
            self.endpoints.lock().unwrap().iter().filter(|e| e.iface_name == iface_name).cloned().collect()
        }
        fn subnets_on_iface(&self, _iface_name: &str) -> Vec<Subnet> {
            vec![]
        }
    }

    fn dhcp_endpoint(mac: MacAddress) -> Endpoint {
        Endpoint {
            uuid: "ep1".into(),
            mac: Some(mac),
            ips: vec![],
            iface_name: "veth1".into(),
            access_iface: None,
            uplink_iface: None,
            epg: None,
            dhcp4: Some(Dhcp4Config {
                ip: Some(IpAddress::V4(Ipv4Address::new(10, 0, 0, 5))),
                prefix_len: Some(24),
                routers: vec![IpAddress::V4(Ipv4Address::new(10, 0, 0, 1))],
                dns: vec![],
                lease_secs: 3600,
            }),
            dhcp6: None,
            virtual_ips: vec![],
            ip_mappings: vec![],
            anycast_return_ips: vec![],
            security_groups: vec![],
            snat_bindings: vec![],
            flags: EndpointFlags::empty(),
        }
    }

    fn arp_request_frame(sender_mac: MacAddress, sender_ip: Ipv4Address, target_ip: Ipv4Address) -> Vec<u8> {
        let req = arp::ArpView {
            opcode: arp::opcode::REQUEST,
            sender_mac,
            sender_ip,
            target_mac: MacAddress::ZERO,
            target_ip,
        };
        // Re-derive the on-wire bytes via a reply-then-inspect roundtrip is
        // unnecessary; build directly using the reply builder's inverse is
        // overkill here, so construct the request by hand.
        let mut payload = vec![0u8; 28];
        payload[0..2].copy_from_slice(&1u16.to_be_bytes());
        payload[2..4].copy_from_slice(&wire::ethertype::IP.to_be_bytes());
        payload[4] = 6;
        payload[5] = 4;
        payload[6..8].copy_from_slice(&req.opcode.to_be_bytes());
        payload[8..14].copy_from_slice(sender_mac.as_bytes());
        payload[14..18].copy_from_slice(&sender_ip.octets());
        payload[18..24].copy_from_slice(MacAddress::ZERO.as_bytes());
        payload[24..28].copy_from_slice(&target_ip.octets());
        wire::build_eth(MacAddress::BROADCAST, sender_mac, wire::ethertype::ARP, &payload)
    }

    fn handler_with(endpoints: Vec<Endpoint>, target_mac: MacAddress) -> PacketInHandler<FakeConnection> {
        let conn = Arc::new(FakeConnection::new());
        let ports = Arc::new(RwLock::new(PortMapper::new()));
        ports.write().unwrap().update("veth1", OfPort::new(1), true);
        let policy: Arc<dyn PolicyLookup> = Arc::new(FixturePolicy { endpoints: StdMutex::new(endpoints), target_mac });
        PacketInHandler::new(conn, ports, policy)
    }

    #[test]
    fn test_arp_request_resolves_via_policy_lookup() {
        let proxied_mac = MacAddress::new([9; 6]);
        let handler = handler_with(vec![], proxied_mac);
        let frame = arp_request_frame(MacAddress::new([1; 6]), Ipv4Address::new(10, 0, 0, 2), Ipv4Address::new(10, 0, 0, 1));
        let pkt = PacketIn { in_port: 1, cookie: Cookie::reserved(CookieClass::NeighDisc).as_u64(), data: frame };
        let reply = handler.process(&pkt).expect("expected an ARP reply");
        let eth = wire::parse_eth(&reply).unwrap();
        let arp_view = arp::parse_arp(eth.payload).unwrap();
        assert_eq!(arp_view.opcode, arp::opcode::REPLY);
        assert_eq!(arp_view.sender_mac, proxied_mac);
    }

    #[test]
    fn test_dhcp4_discover_gets_offer() {
        let client_mac = MacAddress::new([2; 6]);
        let handler = handler_with(vec![dhcp_endpoint(client_mac)], MacAddress::ZERO);

        let mut bootp = vec![0u8; 236];
        bootp[0] = 1;
        bootp[28..34].copy_from_slice(client_mac.as_bytes());
        let mut dhcp = bootp;
        dhcp.extend_from_slice(&[99, 130, 83, 99, 53, 1, dhcp4::msg_type::DISCOVER, 0xff]);
        let udp = wire::build_udp(68, 67, &dhcp, Ipv4Address::UNSPECIFIED, Ipv4Address::BROADCAST);
        let mut ip_payload = wire::build_ipv4(Ipv4Address::UNSPECIFIED, Ipv4Address::BROADCAST, wire::ip_proto::UDP, 64, 0, udp.len());
        ip_payload.extend_from_slice(&udp);
        let frame = wire::build_eth(MacAddress::BROADCAST, client_mac, wire::ethertype::IP, &ip_payload);

        let pkt = PacketIn { in_port: 1, cookie: Cookie::reserved(CookieClass::DhcpV4).as_u64(), data: frame };
        let reply = handler.process(&pkt).expect("expected a DHCP offer");
        let eth = wire::parse_eth(&reply).unwrap();
        let reply_ip = wire::parse_ipv4(eth.payload).unwrap();
        let reply_udp = &reply_ip.payload[8..];
        assert_eq!(reply_udp[4..8], [99, 130, 83, 99]);
    }

    #[test]
    fn test_unhandled_cookie_is_dropped() {
        let handler = handler_with(vec![], MacAddress::ZERO);
        let pkt = PacketIn { in_port: 1, cookie: 0, data: vec![0u8; 14] };
        assert!(handler.process(&pkt).is_none());
    }
}
