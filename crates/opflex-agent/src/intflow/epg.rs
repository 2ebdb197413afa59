//! Per-EPG flows, installed/withdrawn whenever the resolver reports an EPG
//! forwarding-info change (`egDomainUpdated`).

use opflex_ovs::flow::{Action, FlowBuilder, FlowEntry};
use opflex_types::{IpAddress, MacAddress, OfPort};

use crate::policy::types::{EndpointGroup, GroupForwardingInfo, IntraGroupPolicy};

use super::tables::{meta, to_std_ip, MetaOut, Register, TableId, DEFAULT_PRIORITY};

/// Switch-wide facts an EPG's flows need but that don't belong on the EPG
/// object itself (tunnel reachability, the router's own MAC).
#[derive(Debug, Clone, Copy)]
pub struct EpgFlowContext {
    pub tunnel_port: Option<OfPort>,
    pub router_mac: MacAddress,
    pub vxlan_encap: bool,
    /// True once the remote-endpoint inventory for this EPG is known
    /// complete; when true flow 6 (encap-and-flood-to-tunnel) is skipped
    /// since every remote endpoint already has its own unicast override.
    pub remote_inventory_complete: bool,
}

pub fn build_epg_flows(epg: &EndpointGroup, fwd: GroupForwardingInfo, multicast_ip: Option<IpAddress>, ctx: &EpgFlowContext) -> Vec<FlowEntry> {
    let mut flows = Vec::new();
    let vnid = fwd.vnid.as_u32();

    // 1. SRC: tunnel-sourced traffic for this EPG's encap id.
    if let Some(tunnel_port) = ctx.tunnel_port {
        flows.push(
            FlowBuilder::new(TableId::Src)
                .priority(DEFAULT_PRIORITY)
                .in_port(tunnel_port)
                .tun_id(vnid as u64)
                .reg(Register::Reg0, vnid)
                .reg(Register::Reg4, fwd.bd_id)
                .reg(Register::Reg5, fwd.fd_id)
                .reg(Register::Reg6, fwd.rd_id)
                .metadata(meta::POLICY_APPLIED, meta::POLICY_APPLIED)
                .go_to(TableId::SnatRev)
                .build(),
        );
    }

    // 2. POL: intra-EPG disposition. `RequireContract` installs nothing
    // here; the contract expansion in contract.rs supplies the explicit
    // rules at higher priority and the table default otherwise falls
    // through to EXP_DROP.
    match epg.intra_policy {
        IntraGroupPolicy::Allow => {
            flows.push(
                FlowBuilder::new(TableId::Pol)
                    .priority(DEFAULT_PRIORITY)
                    .reg(Register::Reg0, vnid)
                    .reg(Register::Reg2, vnid)
                    .go_to(TableId::Stats)
                    .build(),
            );
        }
        IntraGroupPolicy::Deny => {
            flows.push(
                FlowBuilder::new(TableId::Pol)
                    .priority(DEFAULT_PRIORITY)
                    .reg(Register::Reg0, vnid)
                    .reg(Register::Reg2, vnid)
                    .go_to(TableId::ExpDrop)
                    .build(),
            );
        }
        IntraGroupPolicy::RequireContract => {}
    }

    // 3. BRIDGE: L2 domain membership routes onward to ROUTE.
    flows.push(
        FlowBuilder::new(TableId::Bridge)
            .priority(DEFAULT_PRIORITY)
            .reg(Register::Reg4, fwd.bd_id)
            .go_to(TableId::Route)
            .build(),
    );

    // 4. BRIDGE-flood: broadcast/multicast within the flood domain.
    let mut flood = FlowBuilder::new(TableId::Bridge)
        .priority(DEFAULT_PRIORITY + 1)
        .reg(Register::Reg5, fwd.fd_id)
        .eth_dst(MacAddress::BROADCAST, Some(MacAddress::new([0x01, 0x00, 0x00, 0x00, 0x00, 0x00])))
        .metadata_out(MetaOut::Flood);
    if ctx.vxlan_encap {
        if let Some(mcast) = multicast_ip {
            let mcast_v4 = match mcast {
                IpAddress::V4(v4) => u32::from(std::net::Ipv4Addr::from(v4)),
                IpAddress::V6(_) => 0,
            };
            flood = flood.reg(Register::Reg7, mcast_v4);
        }
    }
    flows.push(flood.go_to(TableId::Stats).build());

    // 5. OUT: resubmit-dst restores source regs for a packet arriving from
    // a remote vnid and continues bridging.
    flows.push(
        FlowBuilder::new(TableId::Out)
            .priority(DEFAULT_PRIORITY)
            .reg(Register::Reg7, vnid)
            .metadata_out(MetaOut::ResubmitDst)
            .action(Action::SetReg { reg: Register::Reg0, value: vnid })
            .action(Action::SetReg { reg: Register::Reg4, value: fwd.bd_id })
            .action(Action::SetReg { reg: Register::Reg5, value: fwd.fd_id })
            .action(Action::SetReg { reg: Register::Reg6, value: fwd.rd_id })
            .action(Action::Resubmit(TableId::Bridge))
            .build(),
    );

    if let Some(tunnel_port) = ctx.tunnel_port {
        if !ctx.remote_inventory_complete {
            // 6. OUT: flood-encap to the tunnel for this EPG's traffic when
            // the remote endpoint isn't individually known yet.
            if let Some(mcast) = multicast_ip {
                flows.push(
                    FlowBuilder::new(TableId::Out)
                        .priority(DEFAULT_PRIORITY)
                        .reg(Register::Reg0, vnid)
                        .metadata_out(MetaOut::Tunnel)
                        .action(Action::EncapVxlan { tun_id: vnid, dst: to_std_ip(mcast) })
                        .action(Action::Output(tunnel_port))
                        .build(),
                );
            }
        }

        // 7. OUT: unicast override when the destination MAC is the fabric
        // router's own MAC, regardless of inventory completeness.
        flows.push(
            FlowBuilder::new(TableId::Out)
                .priority(DEFAULT_PRIORITY + 1)
                .reg(Register::Reg0, vnid)
                .eth_dst(ctx.router_mac, None)
                .metadata_out(MetaOut::Tunnel)
                .action(Action::Output(tunnel_port))
                .build(),
        );
    }

    flows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::types::EndpointGroup;
    use opflex_types::{Uri, Vnid};

    fn sample_epg() -> EndpointGroup {
        EndpointGroup {
            uri: "/g1/".parse::<Uri>().unwrap(),
            bd: Some("/bd/".parse().unwrap()),
            fd: Some("/fd/".parse().unwrap()),
            rd: Some("/rd/".parse().unwrap()),
            vnid: Some(Vnid::new(1234).unwrap()),
            multicast_ip: Some("224.1.1.1".parse().unwrap()),
            intra_policy: IntraGroupPolicy::Allow,
            provider_contracts: vec![],
            consumer_contracts: vec![],
            intra_contracts: vec![],
            nat_epg: None,
        }
    }

    fn sample_ctx() -> EpgFlowContext {
        EpgFlowContext {
            tunnel_port: Some(OfPort::new(9)),
            router_mac: MacAddress::from([0x00, 0x22, 0xbd, 0xf8, 0x19, 0xff]),
            vxlan_encap: true,
            remote_inventory_complete: false,
        }
    }

    #[test]
    fn test_allow_intra_policy_emits_pol_allow() {
        let epg = sample_epg();
        let fwd = GroupForwardingInfo { vnid: epg.vnid.unwrap(), rd_id: 1, bd_id: 2, fd_id: 3 };
        let flows = build_epg_flows(&epg, fwd, epg.multicast_ip, &sample_ctx());
        assert!(flows.iter().any(|f| f.table == TableId::Pol && f.actions.contains(&Action::GotoTable(TableId::Stats))));
    }

    #[test]
    fn test_deny_intra_policy_emits_pol_drop() {
        let mut epg = sample_epg();
        epg.intra_policy = IntraGroupPolicy::Deny;
        let fwd = GroupForwardingInfo { vnid: epg.vnid.unwrap(), rd_id: 1, bd_id: 2, fd_id: 3 };
        let flows = build_epg_flows(&epg, fwd, epg.multicast_ip, &sample_ctx());
        assert!(flows.iter().any(|f| f.table == TableId::Pol && f.actions.contains(&Action::GotoTable(TableId::ExpDrop))));
    }

    #[test]
    fn test_require_contract_emits_no_implicit_pol_flow() {
        let mut epg = sample_epg();
        epg.intra_policy = IntraGroupPolicy::RequireContract;
        let fwd = GroupForwardingInfo { vnid: epg.vnid.unwrap(), rd_id: 1, bd_id: 2, fd_id: 3 };
        let flows = build_epg_flows(&epg, fwd, epg.multicast_ip, &sample_ctx());
        assert!(!flows.iter().any(|f| f.table == TableId::Pol));
    }

    #[test]
    fn test_router_mac_override_skips_when_no_tunnel() {
        let epg = sample_epg();
        let fwd = GroupForwardingInfo { vnid: epg.vnid.unwrap(), rd_id: 1, bd_id: 2, fd_id: 3 };
        let mut ctx = sample_ctx();
        ctx.tunnel_port = None;
        let flows = build_epg_flows(&epg, fwd, epg.multicast_ip, &ctx);
        assert!(!flows.iter().any(|f| f.m.eth_dst.is_some()));
    }
}
