//! Per-protocol, per-port-range source-NAT binding flows.

use opflex_ovs::flow::{Action, FlowBuilder, FlowEntry};
use opflex_types::MacAddress;

use super::tables::{to_std_ip, Register, TableId, DEFAULT_PRIORITY};
use crate::policy::types::SnatBinding;

/// TCP and UDP are the only protocols SNAT rewrites a port for; anything
/// else only rewrites the address.
const TCP: u8 = 6;
const UDP: u8 = 17;

pub fn build_snat_flows(binding: &SnatBinding, rd_id: u32, ep_mac: MacAddress) -> Vec<FlowEntry> {
    let mut flows = Vec::new();
    let (min, max) = binding.port_range;
    let masks = opflex_ovs::decompose_range(min, max);

    for proto in [TCP, UDP] {
        for mask in &masks {
            flows.push(
                FlowBuilder::new(TableId::Snat)
                    .priority(DEFAULT_PRIORITY)
                    .reg(Register::Reg6, rd_id)
                    .proto(proto)
                    .tp_src(mask.value, mask.mask)
                    .action(Action::SetIpSrc(to_std_ip(binding.snat_ip)))
                    .action(Action::SetEthSrc(binding.iface_mac))
                    .action(Action::ConntrackCommit { zone: rd_id as u16, mark: None })
                    .go_to(TableId::NatIn)
                    .build(),
            );

            // SNAT_REV: reverse NAT unconditionally conntrack-unnats,
            // then restores the endpoint's own MAC before bridging on.
            flows.push(
                FlowBuilder::new(TableId::SnatRev)
                    .priority(DEFAULT_PRIORITY)
                    .ip_dst(to_std_ip(binding.snat_ip), 32)
                    .proto(proto)
                    .tp_dst(mask.value, mask.mask)
                    .action(Action::ConntrackRecirc { zone: rd_id as u16 })
                    .action(Action::SetEthDst(ep_mac))
                    .go_to(TableId::ServiceRev)
                    .build(),
            );
        }
    }

    flows
}
