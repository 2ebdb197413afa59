//! Virtual-IP announcement detection: when an endpoint gratuitously
//! announces an address (ARP or unsolicited NA) that falls inside one of
//! its configured virtual-IP CIDRs, the agent notices and notifies upward
//! so the policy resolver can update where that VIP currently lives.

use opflex_types::IpAddress;

use crate::policy::types::Endpoint;

fn prefix_covers(cidr: &opflex_types::IpPrefix, addr: &IpAddress) -> bool {
    match (cidr.address(), addr) {
        (IpAddress::V4(net), IpAddress::V4(candidate)) => {
            let net_bits = u32::from_be_bytes(net.octets());
            let candidate_bits = u32::from_be_bytes(candidate.octets());
            let prefix_len = cidr.prefix_len();
            let mask = if prefix_len == 0 { 0 } else { u32::MAX << (32 - prefix_len) };
            net_bits & mask == candidate_bits & mask
        }
        (IpAddress::V6(net), IpAddress::V6(candidate)) => {
            let net_bits = u128::from_be_bytes(net.octets());
            let candidate_bits = u128::from_be_bytes(candidate.octets());
            let prefix_len = cidr.prefix_len();
            let mask = if prefix_len == 0 { 0 } else { u128::MAX << (128 - prefix_len) };
            net_bits & mask == candidate_bits & mask
        }
        _ => false,
    }
}

/// A virtual-IP announcement recognized on `ingress_iface`: `endpoint_uuid`
/// owns a virtual-IP CIDR that covers `announced_ip`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VipAnnouncement {
    pub endpoint_uuid: String,
    pub announced_ip: IpAddress,
}

/// Scans `endpoints` on `ingress_iface` for one whose virtual-IP CIDRs cover
/// `announced_ip`, as seen in a gratuitous ARP or unsolicited NA punted up
/// from that interface.
pub fn detect_vip_announcement(endpoints: &[Endpoint], ingress_iface: &str, announced_ip: IpAddress) -> Option<VipAnnouncement> {
    endpoints
        .iter()
        .filter(|ep| ep.iface_name == ingress_iface)
        .find(|ep| ep.virtual_ips.iter().any(|vip| prefix_covers(&vip.cidr, &announced_ip)))
        .map(|ep| VipAnnouncement { endpoint_uuid: ep.uuid.clone(), announced_ip })
}
