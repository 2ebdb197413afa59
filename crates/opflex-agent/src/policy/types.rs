//! The group-based policy data model resolved from the MODB.
//!
//! These are plain value types: the MODB itself (the observable, typed
//! key/value store with change notifications) is an external collaborator,
//! so this module only defines what a resolved snapshot of one of its
//! objects looks like. Grounded on the teacher's typed-object pattern (e.g.
//! `RouteEntry`/`NextHopGroupKey`) but the fields follow the data model.

use std::collections::HashSet;

use opflex_types::{IpAddress, IpPrefix, MacAddress, Uri, Vnid};

bitflags::bitflags! {
    /// Per-endpoint behavior flags. Modeled as an explicit bitset (resolved
    /// open question) rather than a single opaque "is external" boolean, so
    /// each call site that bypasses a check names exactly which one.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EndpointFlags: u32 {
        const EXTERNAL              = 1 << 0;
        const AAP_MODE              = 1 << 1;
        const PROMISCUOUS           = 1 << 2;
        const DISCOVERY_PROXY       = 1 << 3;
        const NAT_MODE              = 1 << 4;
        const ACCESS_ALLOW_UNTAGGED = 1 << 5;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualIp {
    pub mac: MacAddress,
    pub cidr: IpPrefix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpMapping {
    pub mapped_ip: IpAddress,
    pub floating_ip: IpAddress,
    pub target_epg: Uri,
    pub next_hop_if: Option<String>,
    pub next_hop_mac: Option<MacAddress>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dhcp4Config {
    pub ip: Option<IpAddress>,
    pub prefix_len: Option<u8>,
    pub routers: Vec<IpAddress>,
    pub dns: Vec<IpAddress>,
    pub lease_secs: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dhcp6Config {
    pub addresses: Vec<IpAddress>,
    pub dns: Vec<IpAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub uuid: String,
    pub mac: Option<MacAddress>,
    pub ips: Vec<IpAddress>,
    pub iface_name: String,
    pub access_iface: Option<String>,
    pub uplink_iface: Option<String>,
    pub epg: Option<Uri>,
    pub dhcp4: Option<Dhcp4Config>,
    pub dhcp6: Option<Dhcp6Config>,
    pub virtual_ips: Vec<VirtualIp>,
    pub ip_mappings: Vec<IpMapping>,
    pub anycast_return_ips: Vec<IpAddress>,
    pub security_groups: Vec<Uri>,
    pub snat_bindings: Vec<String>,
    pub flags: EndpointFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntraGroupPolicy {
    Allow,
    Deny,
    RequireContract,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointGroup {
    pub uri: Uri,
    pub bd: Option<Uri>,
    pub fd: Option<Uri>,
    pub rd: Option<Uri>,
    pub vnid: Option<Vnid>,
    pub multicast_ip: Option<IpAddress>,
    pub intra_policy: IntraGroupPolicy,
    pub provider_contracts: Vec<Uri>,
    pub consumer_contracts: Vec<Uri>,
    pub intra_contracts: Vec<Uri>,
    pub nat_epg: Option<Uri>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArpMode {
    Unicast,
    Flood,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NdMode {
    Unicast,
    Flood,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloodMode {
    Flood,
    Drop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeDomain {
    pub uri: Uri,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FloodDomain {
    pub uri: Uri,
    pub bd: Uri,
    pub arp_mode: ArpMode,
    pub nd_mode: NdMode,
    pub unknown_flood_mode: FloodMode,
    pub bcast_flood_mode: FloodMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementPreference {
    Enforced,
    Unenforced,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    pub address: IpAddress,
    pub prefix_len: u8,
    pub virtual_router_ip: Option<IpAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDomain {
    pub uri: Uri,
    pub enforcement: EnforcementPreference,
    pub internal_subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleDirection {
    In,
    Out,
    Bidirectional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleAction {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConntrackMode {
    None,
    Reflexive,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Classifier {
    pub ethertype: Option<u16>,
    pub ip_proto: Option<u8>,
    pub l4_src_ports: Option<(u16, u16)>,
    pub l4_dst_ports: Option<(u16, u16)>,
    pub icmp_type: Option<u8>,
    pub icmp_code: Option<u8>,
    pub tcp_flags: Option<(u16, u16)>,
    pub conntrack: ConntrackMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRule {
    pub uri: Uri,
    pub direction: RuleDirection,
    pub action: RuleAction,
    /// Order within the contract; lower means earlier (higher priority).
    pub order: u32,
    pub classifier: Classifier,
    pub redirect_dest: Option<Uri>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contract {
    pub uri: Uri,
    pub rules: Vec<PolicyRule>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityGroup {
    pub uri: Uri,
    pub rules: Vec<PolicyRule>,
}

/// Builds the stable cache key for a set of security groups applied to an
/// endpoint: the member URIs sorted and joined with `,` before allocating a
/// `secGroupSet` namespace id, so two endpoints with identical (unordered)
/// membership share one cookie and flow set.
pub fn security_group_set_key(groups: &[Uri]) -> String {
    let mut sorted: Vec<&str> = groups.iter().map(|u| u.as_str()).collect();
    sorted.sort_unstable();
    sorted.join(",")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceMode {
    LocalAnycast,
    LoadBalancer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceConntrackMode {
    None,
    Reflexive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceMapping {
    pub service_ip: IpAddress,
    pub service_port: u16,
    pub proto: u8,
    pub gateway_ip: Option<IpAddress>,
    pub next_hop_ips: Vec<IpAddress>,
    pub next_hop_port: u16,
    pub conntrack: ServiceConntrackMode,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub uuid: String,
    pub mode: ServiceMode,
    pub domain: Uri,
    pub iface: Option<String>,
    pub vlan: Option<u16>,
    pub mac: Option<MacAddress>,
    pub ip: Option<IpAddress>,
    pub mappings: Vec<ServiceMapping>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIpRoute {
    pub ip: IpAddress,
    pub prefix_len: u8,
    pub next_hop_ip: Option<IpAddress>,
    pub next_hop_mac: Option<MacAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    pub uuid: String,
    pub mac: MacAddress,
    pub next_hop_tunnel_ip: IpAddress,
    pub routes: Vec<RemoteIpRoute>,
    pub epg: Uri,
}

/// Per-port-range SNAT binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnatBinding {
    pub uuid: String,
    pub snat_ip: IpAddress,
    pub port_range: (u16, u16),
    pub iface_mac: MacAddress,
    pub rd: Uri,
}

/// Computed forwarding identifiers for an EPG: a pure function of MODB
/// state, stable across restart when the id generator is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupForwardingInfo {
    pub vnid: Vnid,
    pub rd_id: u32,
    pub bd_id: u32,
    pub fd_id: u32,
}

/// The set of EPG URIs that currently occupy a flood domain's flood-group
/// bucket list, used to enforce the "at most one bucket list at a time"
/// invariant when an endpoint transitions between flood domains.
pub type FloodMembership = HashSet<Uri>;
