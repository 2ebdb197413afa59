//! Service flows: load-balancer virtual-IP intercept with multipath
//! next-hop selection, and local-anycast service advertisement.

use opflex_ovs::flow::{Action, FlowBuilder, FlowEntry};
use opflex_types::IpAddress;

use super::tables::{to_std_ip, Register, TableId, DEFAULT_PRIORITY};
use crate::policy::types::{Service, ServiceConntrackMode, ServiceMapping, ServiceMode};

/// Builds the BRIDGE-table intercept and SERVICE_NH/SERVICE_REV flows for
/// one service's mappings. `ct_mark` is the id-generator value allocated
/// for this service (`idGen(service/<uuid>)` per the component design).
pub fn build_service_flows(svc: &Service, ct_mark: u32) -> Vec<FlowEntry> {
    match svc.mode {
        ServiceMode::LoadBalancer => build_load_balancer_flows(svc, ct_mark),
        ServiceMode::LocalAnycast => build_local_anycast_flows(svc),
    }
}

fn build_load_balancer_flows(svc: &Service, ct_mark: u32) -> Vec<FlowEntry> {
    let mut flows = Vec::new();

    for mapping in &svc.mappings {
        // BRIDGE intercept: traffic to the virtual service address is
        // committed to conntrack tagged with this service's mark and
        // resubmitted to SERVICE_NH for next-hop rewrite.
        flows.push(
            FlowBuilder::new(TableId::Bridge)
                .priority(DEFAULT_PRIORITY + 10)
                .ip_dst(to_std_ip(mapping.service_ip), 32)
                .proto(mapping.proto)
                .tp_dst(mapping.service_port, 0xffff)
                .action(Action::ConntrackCommit { zone: 0, mark: Some(ct_mark) })
                .action(Action::Resubmit(TableId::ServiceNh))
                .build(),
        );

        // SERVICE_NH: one flow per next-hop, selected by multipath hash
        // (reg arithmetic happens at apply time; here each next-hop gets
        // its own priority-ordered candidate flow standing in for a bucket
        // of a select group).
        for (idx, next_hop) in mapping.next_hop_ips.iter().enumerate() {
            flows.push(
                FlowBuilder::new(TableId::ServiceNh)
                    .priority(DEFAULT_PRIORITY + mapping.next_hop_ips.len() as u16 - idx as u16)
                    .reg(Register::Reg8, idx as u32)
                    .action(Action::SetIpDst(to_std_ip(*next_hop)))
                    .action(Action::SetReg { reg: Register::Reg9, value: mapping.next_hop_port as u32 })
                    .go_to(TableId::Route)
                    .build(),
            );
        }

        if mapping.conntrack == ServiceConntrackMode::Reflexive {
            for next_hop in &mapping.next_hop_ips {
                flows.push(
                    FlowBuilder::new(TableId::ServiceRev)
                        .priority(DEFAULT_PRIORITY)
                        .ip_src(to_std_ip(*next_hop), 32)
                        .ct_mark(ct_mark, u32::MAX)
                        .action(Action::Resubmit(TableId::Bridge))
                        .build(),
                );
            }
        }
    }

    flows
}

fn build_local_anycast_flows(svc: &Service) -> Vec<FlowEntry> {
    let Some(ip) = svc.ip else { return Vec::new() };
    vec![FlowBuilder::new(TableId::Bridge)
        .priority(DEFAULT_PRIORITY + 10)
        .ip_dst(to_std_ip(ip), 32)
        .go_to(TableId::ServiceDst)
        .build()]
}
