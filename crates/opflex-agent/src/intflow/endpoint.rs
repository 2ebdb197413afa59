//! Per-endpoint flows: port-security allow, source classification, bridge
//! destination, proxy-ARP/ND for owned addresses, and (when the endpoint
//! carries IP mappings) the NAT rewrite pairs from E4.

use opflex_ovs::flow::{Action, FlowBuilder, FlowEntry};
use opflex_types::{Cookie, CookieClass, IpAddress, MacAddress, OfPort};

use super::tables::{meta, to_std_ip, MetaOut, Register, TableId, DEFAULT_PRIORITY};
use crate::policy::types::{Endpoint, GroupForwardingInfo, IpMapping};

/// Context shared by every endpoint's flows: its resolved EPG forwarding
/// info and the OF port its interface maps to.
#[derive(Debug, Clone, Copy)]
pub struct EndpointFlowContext {
    pub port: OfPort,
    pub fwd: GroupForwardingInfo,
    pub router_mac: MacAddress,
}

pub fn build_endpoint_flows(ep: &Endpoint, ctx: &EndpointFlowContext) -> Vec<FlowEntry> {
    let mut flows = Vec::new();
    let Some(mac) = ep.mac else { return flows };
    let vnid = ctx.fwd.vnid.as_u32();

    // SEC: allow L3 traffic sourced from this endpoint's (port, mac) pair.
    flows.push(
        FlowBuilder::new(TableId::Sec)
            .priority(DEFAULT_PRIORITY)
            .in_port(ctx.port)
            .eth_src(mac, None)
            .go_to(TableId::Src)
            .build(),
    );

    // SRC: classify into (sEPG, bd, fd, rd).
    flows.push(
        FlowBuilder::new(TableId::Src)
            .priority(DEFAULT_PRIORITY)
            .in_port(ctx.port)
            .eth_src(mac, None)
            .reg(Register::Reg0, vnid)
            .reg(Register::Reg4, ctx.fwd.bd_id)
            .reg(Register::Reg5, ctx.fwd.fd_id)
            .reg(Register::Reg6, ctx.fwd.rd_id)
            .metadata(meta::POLICY_APPLIED, meta::POLICY_APPLIED)
            .go_to(TableId::SnatRev)
            .build(),
    );

    // BRIDGE: L2 destination lookup by this endpoint's MAC within its bd.
    flows.push(
        FlowBuilder::new(TableId::Bridge)
            .priority(DEFAULT_PRIORITY + 1)
            .eth_dst(mac, None)
            .reg(Register::Reg4, ctx.fwd.bd_id)
            .action(Action::SetReg { reg: Register::Reg2, value: vnid })
            .action(Action::SetReg { reg: Register::Reg7, value: ctx.port.as_u32() })
            .go_to(TableId::Pol)
            .build(),
    );

    // Proxy-ARP/ND for each owned address.
    for ip in &ep.ips {
        flows.push(build_proxy_arp_nd(*ip, mac, ctx.fwd.bd_id));
    }
    for vip in &ep.virtual_ips {
        flows.push(build_proxy_arp_nd(*vip.cidr.address(), vip.mac, ctx.fwd.bd_id));
    }

    flows
}

fn build_proxy_arp_nd(ip: IpAddress, mac: MacAddress, bd_id: u32) -> FlowEntry {
    match ip {
        IpAddress::V4(_) => FlowBuilder::new(TableId::Bridge)
            .priority(DEFAULT_PRIORITY + 2)
            .reg(Register::Reg4, bd_id)
            .arp_dst(to_std_ip(ip), 32)
            .cookie(Cookie::reserved(CookieClass::NeighDisc))
            .action(Action::SetEthSrc(mac))
            .action(Action::Controller { max_len: 64 })
            .build(),
        IpAddress::V6(_) => FlowBuilder::new(TableId::Bridge)
            .priority(DEFAULT_PRIORITY + 2)
            .reg(Register::Reg4, bd_id)
            .nd_target(135, to_std_ip(ip), 128, 0)
            .cookie(Cookie::reserved(CookieClass::NeighDisc))
            .action(Action::SetEthSrc(mac))
            .action(Action::Controller { max_len: 64 })
            .build(),
    }
}

/// Builds the NAT rewrite pairs for one IP mapping (E4): the outbound
/// ROUTE entry that rewrites a floating-IP destination back to the
/// endpoint's mapped address and forwards into NAT_IN, the OUT-table
/// egress entry that performs the reverse rewrite, and the two reverse
/// flows installed on the mapping's next-hop port.
pub fn build_ip_mapping_flows(mapping: &IpMapping, ep_mac: MacAddress, ep_fwd: GroupForwardingInfo, nat_vnid: u32, nat_rd_id: u32, ep_port: OfPort, next_hop_port: Option<OfPort>, router_mac: MacAddress) -> Vec<FlowEntry> {
    let mut flows = Vec::new();

    // ROUTE: floating-IP destination, arriving with the NAT EPG's regs,
    // rewrites to the endpoint's mapped address and restores the
    // endpoint's own forwarding identifiers.
    flows.push(
        FlowBuilder::new(TableId::Route)
            .priority(DEFAULT_PRIORITY + 10)
            .reg(Register::Reg6, nat_rd_id)
            .ip_dst(to_std_ip(mapping.floating_ip), 32)
            .reg(Register::Reg0, nat_vnid)
            .action(Action::SetEthSrc(router_mac))
            .action(Action::SetEthDst(ep_mac))
            .action(Action::SetIpDst(to_std_ip(mapping.mapped_ip)))
            .action(Action::DecTtl)
            .action(Action::SetReg { reg: Register::Reg4, value: ep_fwd.bd_id })
            .action(Action::SetReg { reg: Register::Reg5, value: ep_fwd.fd_id })
            .action(Action::SetReg { reg: Register::Reg6, value: ep_fwd.rd_id })
            .action(Action::SetReg { reg: Register::Reg7, value: ep_port.as_u32() })
            .go_to(TableId::NatIn)
            .build(),
    );

    // OUT: egress NAT rewrites the endpoint's mapped-IP source back to the
    // floating IP before handing off to the chosen disposition.
    flows.push(
        FlowBuilder::new(TableId::Out)
            .priority(DEFAULT_PRIORITY + 10)
            .ip_src(to_std_ip(mapping.mapped_ip), 32)
            .metadata_out(MetaOut::Nat)
            .action(Action::SetIpSrc(to_std_ip(mapping.floating_ip)))
            .action(Action::SetReg { reg: Register::Reg0, value: nat_vnid })
            .action(Action::Resubmit(TableId::Bridge))
            .build(),
    );

    if let Some(port) = next_hop_port {
        // Two reverse flows on the next-hop port: one SEC allow, one SRC
        // classification into the NAT EPG's regs.
        flows.push(
            FlowBuilder::new(TableId::Sec)
                .priority(DEFAULT_PRIORITY)
                .in_port(port)
                .go_to(TableId::Src)
                .build(),
        );
        flows.push(
            FlowBuilder::new(TableId::Src)
                .priority(DEFAULT_PRIORITY)
                .in_port(port)
                .reg(Register::Reg0, nat_vnid)
                .go_to(TableId::SnatRev)
                .build(),
        );
    }

    flows
}

#[cfg(test)]
mod tests {
    use super::*;
    use opflex_types::Vnid;

    fn sample_ep() -> Endpoint {
        Endpoint {
            uuid: "e1".into(),
            mac: Some(MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55])),
            ips: vec!["10.0.0.5".parse().unwrap()],
            iface_name: "veth1".into(),
            access_iface: None,
            uplink_iface: None,
            epg: Some("/g1/".parse().unwrap()),
            dhcp4: None,
            dhcp6: None,
            virtual_ips: vec![],
            ip_mappings: vec![],
            anycast_return_ips: vec![],
            security_groups: vec![],
            snat_bindings: vec![],
            flags: Default::default(),
        }
    }

    fn sample_ctx() -> EndpointFlowContext {
        EndpointFlowContext {
            port: OfPort::new(7),
            fwd: GroupForwardingInfo { vnid: Vnid::new(1234).unwrap(), rd_id: 1, bd_id: 2, fd_id: 3 },
            router_mac: MacAddress::new([0x00, 0x22, 0xbd, 0xf8, 0x19, 0xff]),
        }
    }

    #[test]
    fn test_sec_flow_matches_port_and_mac() {
        let ep = sample_ep();
        let flows = build_endpoint_flows(&ep, &sample_ctx());
        let sec = flows.iter().find(|f| f.table == TableId::Sec).unwrap();
        assert_eq!(sec.m.in_port, Some(OfPort::new(7)));
        assert!(sec.m.eth_src.is_some());
    }

    #[test]
    fn test_bridge_flow_sets_reg2_and_reg7() {
        let ep = sample_ep();
        let flows = build_endpoint_flows(&ep, &sample_ctx());
        let bridge = flows.iter().find(|f| f.table == TableId::Bridge).unwrap();
        assert!(bridge.actions.contains(&Action::SetReg { reg: Register::Reg2, value: 1234 }));
        assert!(bridge.actions.contains(&Action::SetReg { reg: Register::Reg7, value: 7 }));
    }

    #[test]
    fn test_proxy_arp_emitted_for_each_owned_ip() {
        let ep = sample_ep();
        let flows = build_endpoint_flows(&ep, &sample_ctx());
        let proxy_count = flows.iter().filter(|f| f.cookie == Cookie::reserved(CookieClass::NeighDisc)).count();
        assert_eq!(proxy_count, 1);
    }

    #[test]
    fn test_ip_mapping_emits_route_and_out_rewrite() {
        let mapping = IpMapping {
            mapped_ip: "10.0.0.5".parse().unwrap(),
            floating_ip: "5.5.5.5".parse().unwrap(),
            target_epg: "/nat/".parse().unwrap(),
            next_hop_if: Some("nh".into()),
            next_hop_mac: None,
        };
        let flows = build_ip_mapping_flows(
            &mapping,
            MacAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            GroupForwardingInfo { vnid: Vnid::new(1234).unwrap(), rd_id: 1, bd_id: 2, fd_id: 3 },
            0x4242,
            9,
            OfPort::new(7),
            Some(OfPort::new(8)),
            MacAddress::new([0x00, 0x22, 0xbd, 0xf8, 0x19, 0xff]),
        );
        assert!(flows.iter().any(|f| f.table == TableId::Route));
        assert!(flows.iter().any(|f| f.table == TableId::Out));
        let on_next_hop: Vec<_> = flows.iter().filter(|f| f.m.in_port == Some(OfPort::new(8))).collect();
        assert_eq!(on_next_hop.len(), 2);
    }
}
