//! Flows for remote endpoints learned over the fabric: unicast tunnel
//! override per destination MAC, plus one route per advertised subnet.

use opflex_ovs::flow::{Action, FlowBuilder, FlowEntry};
use opflex_types::OfPort;

use super::tables::{to_std_ip, Register, TableId, DEFAULT_PRIORITY};
use crate::policy::types::RemoteEndpoint;

pub fn build_remote_endpoint_flows(remote: &RemoteEndpoint, epg_vnid: u32, tunnel_port: OfPort) -> Vec<FlowEntry> {
    let mut flows = Vec::new();

    // OUT: unicast to this remote endpoint's MAC encapsulates toward its
    // own tunnel next-hop rather than the EPG's flood/multicast address.
    flows.push(
        FlowBuilder::new(TableId::Out)
            .priority(DEFAULT_PRIORITY + 5)
            .reg(Register::Reg0, epg_vnid)
            .eth_dst(remote.mac, None)
            .metadata_out(super::tables::MetaOut::RemoteTunnel)
            .action(Action::EncapVxlan { tun_id: epg_vnid, dst: to_std_ip(remote.next_hop_tunnel_ip) })
            .action(Action::Output(tunnel_port))
            .build(),
    );

    // ROUTE: each advertised subnet routes through this remote endpoint.
    for route in &remote.routes {
        let mut b = FlowBuilder::new(TableId::Route)
            .priority(DEFAULT_PRIORITY)
            .ip_dst(to_std_ip(route.ip), route.prefix_len)
            .action(Action::DecTtl)
            .action(Action::SetEthDst(remote.mac));
        if let Some(mac) = route.next_hop_mac {
            b = b.action(Action::SetEthDst(mac));
        }
        flows.push(b.metadata_out(super::tables::MetaOut::RemoteTunnel).go_to(TableId::Out).build());
    }

    flows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::types::RemoteIpRoute;
    use opflex_types::MacAddress;

    #[test]
    fn test_one_route_flow_per_advertised_subnet() {
        let remote = RemoteEndpoint {
            uuid: "r1".into(),
            mac: MacAddress::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
            next_hop_tunnel_ip: "10.10.10.10".parse().unwrap(),
            routes: vec![
                RemoteIpRoute { ip: "192.168.1.0".parse().unwrap(), prefix_len: 24, next_hop_ip: None, next_hop_mac: None },
                RemoteIpRoute { ip: "192.168.2.0".parse().unwrap(), prefix_len: 24, next_hop_ip: None, next_hop_mac: None },
            ],
            epg: "/g1/".parse().unwrap(),
        };
        let flows = build_remote_endpoint_flows(&remote, 1234, OfPort::new(9));
        let route_flows: Vec<_> = flows.iter().filter(|f| f.table == TableId::Route).collect();
        assert_eq!(route_flows.len(), 2);
    }
}
