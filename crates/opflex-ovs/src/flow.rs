//! Fluent flow-entry and action construction.
//!
//! Mirrors the shape of the original agent's `FlowBuilder`/`ActionBuilder`:
//! a chain of setter calls that accumulate into match fields and an action
//! instruction list, finished off with [`FlowBuilder::build`]. Unlike the
//! original, there's no OVS `match` struct underneath to poke at through FFI
//! — matches and actions are plain Rust data the `SwitchConnection`
//! implementation serializes however its wire codec wants.

use std::net::IpAddr;

use opflex_types::{Cookie, MacAddress, OfPort};

use crate::types::{GroupId, MetaOut, Register, TableId};

/// ethertype constants the builder needs to reason about `ethType_`-gated
/// match fields (IP vs ARP vs IPv6 vs "not yet set").
pub mod eth_type {
    pub const IP: u16 = 0x0800;
    pub const ARP: u16 = 0x0806;
    pub const IPV6: u16 = 0x86dd;
}

/// A masked Ethernet address match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacMatch {
    pub addr: MacAddress,
    pub mask: Option<MacAddress>,
}

/// A masked IP prefix match (subnet, not necessarily CIDR-aligned).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpMatch {
    pub addr: IpAddr,
    pub prefix_len: u8,
}

/// A masked register match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegMatch {
    pub reg: Register,
    pub value: u32,
    pub mask: u32,
}

/// Accumulated match fields for one flow entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Match {
    pub in_port: Option<OfPort>,
    pub eth_type: u16,
    pub eth_src: Option<MacMatch>,
    pub eth_dst: Option<MacMatch>,
    pub ip_src: Option<IpMatch>,
    pub ip_dst: Option<IpMatch>,
    pub outer_ip_src: Option<IpMatch>,
    pub outer_ip_dst: Option<IpMatch>,
    pub ip_proto: Option<u8>,
    pub tp_src: Option<(u16, u16)>,
    pub tp_dst: Option<(u16, u16)>,
    pub tcp_flags: Option<(u16, u16)>,
    pub vlan: Option<u16>,
    pub tun_id: Option<u64>,
    pub regs: Vec<RegMatch>,
    pub metadata: Option<(u64, u64)>,
    pub pkt_mark: Option<(u32, u32)>,
    pub ct_state: Option<(u32, u32)>,
    pub ct_mark: Option<(u32, u32)>,
    pub nd_target: Option<IpMatch>,
}

/// A single action in a flow's instruction list.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetReg { reg: Register, value: u32 },
    SetMetadata { value: u64, mask: u64 },
    SetEthSrc(MacAddress),
    SetEthDst(MacAddress),
    SetIpSrc(IpAddr),
    SetIpDst(IpAddr),
    DecTtl,
    PushVlan(u16),
    PopVlan,
    EncapVxlan { tun_id: u32, dst: IpAddr },
    ConntrackCommit { zone: u16, mark: Option<u32> },
    ConntrackRecirc { zone: u16 },
    Output(OfPort),
    OutputToGroup(GroupId),
    OutputInPort,
    Resubmit(TableId),
    GotoTable(TableId),
    Controller { max_len: u16 },
    Drop,
}

/// A fully constructed flow entry, ready to hand to a [`crate::conn::SwitchConnection`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlowEntry {
    pub table: TableId,
    pub priority: u16,
    pub cookie: Cookie,
    pub m: Match,
    pub actions: Vec<Action>,
    /// OFPFF_SEND_FLOW_REM: ask the switch for a flow-removed message when
    /// this entry is evicted, so the stats manager can retire its counters.
    pub send_flow_removed: bool,
}

/// Fluent builder for a single flow entry.
///
/// Tracks the ethertype implied by prior match calls (`eth_type_`) the same
/// way the original builder does, so a caller can match `ipSrc`/`ipDst`
/// without first calling `ethType` explicitly, and a second call for the
/// "wrong" L3 protocol is silently ignored rather than corrupting the match.
#[derive(Debug, Clone)]
pub struct FlowBuilder {
    table: TableId,
    priority: u16,
    cookie: Cookie,
    m: Match,
    actions: Vec<Action>,
    send_flow_removed: bool,
}

impl FlowBuilder {
    pub fn new(table: TableId) -> Self {
        FlowBuilder {
            table,
            priority: 0,
            cookie: Cookie::from_raw(0),
            m: Match::default(),
            actions: Vec::new(),
            send_flow_removed: false,
        }
    }

    pub fn send_flow_removed(mut self) -> Self {
        self.send_flow_removed = true;
        self
    }

    pub fn priority(mut self, prio: u16) -> Self {
        self.priority = prio;
        self
    }

    pub fn cookie(mut self, cookie: Cookie) -> Self {
        self.cookie = cookie;
        self
    }

    pub fn in_port(mut self, port: OfPort) -> Self {
        self.m.in_port = Some(port);
        self
    }

    pub fn eth_type(mut self, eth_type: u16) -> Self {
        self.m.eth_type = eth_type;
        self
    }

    pub fn eth_src(mut self, addr: MacAddress, mask: Option<MacAddress>) -> Self {
        self.m.eth_src = Some(MacMatch { addr, mask });
        self
    }

    pub fn eth_dst(mut self, addr: MacAddress, mask: Option<MacAddress>) -> Self {
        self.m.eth_dst = Some(MacMatch { addr, mask });
        self
    }

    fn gate_eth_type(&mut self, wanted: u16, also_allow: &[u16]) -> bool {
        if self.m.eth_type == 0 {
            self.m.eth_type = wanted;
            return true;
        }
        self.m.eth_type == wanted || also_allow.contains(&self.m.eth_type)
    }

    /// Matches a source subnet, inferring the ethertype (IPv4 or IPv6) from
    /// the address if none has been set yet. A second call with the "wrong"
    /// L3 family after the ethertype is already pinned is a no-op, mirroring
    /// the original builder's gated behavior.
    pub fn ip_src(mut self, addr: IpAddr, prefix_len: u8) -> Self {
        let wanted = if addr.is_ipv4() { eth_type::IP } else { eth_type::IPV6 };
        let allow = if addr.is_ipv4() { &[eth_type::ARP][..] } else { &[][..] };
        if self.gate_eth_type(wanted, allow) {
            self.m.ip_src = Some(IpMatch { addr, prefix_len });
        }
        self
    }

    pub fn ip_dst(mut self, addr: IpAddr, prefix_len: u8) -> Self {
        let wanted = if addr.is_ipv4() { eth_type::IP } else { eth_type::IPV6 };
        let allow = if addr.is_ipv4() { &[eth_type::ARP][..] } else { &[][..] };
        if self.gate_eth_type(wanted, allow) {
            self.m.ip_dst = Some(IpMatch { addr, prefix_len });
        }
        self
    }

    pub fn arp_src(mut self, addr: IpAddr, prefix_len: u8) -> Self {
        self.m.eth_type = eth_type::ARP;
        self.m.ip_src = Some(IpMatch { addr, prefix_len });
        self
    }

    pub fn arp_dst(mut self, addr: IpAddr, prefix_len: u8) -> Self {
        self.m.eth_type = eth_type::ARP;
        self.m.ip_dst = Some(IpMatch { addr, prefix_len });
        self
    }

    pub fn outer_ip_src(mut self, addr: IpAddr, prefix_len: u8) -> Self {
        let wanted = if addr.is_ipv4() { eth_type::IP } else { eth_type::IPV6 };
        let allow = if addr.is_ipv4() { &[eth_type::ARP][..] } else { &[][..] };
        if self.gate_eth_type(wanted, allow) {
            self.m.outer_ip_src = Some(IpMatch { addr, prefix_len });
        }
        self
    }

    pub fn outer_ip_dst(mut self, addr: IpAddr, prefix_len: u8) -> Self {
        let wanted = if addr.is_ipv4() { eth_type::IP } else { eth_type::IPV6 };
        let allow = if addr.is_ipv4() { &[eth_type::ARP][..] } else { &[][..] };
        if self.gate_eth_type(wanted, allow) {
            self.m.outer_ip_dst = Some(IpMatch { addr, prefix_len });
        }
        self
    }

    /// Matches a neighbor-discovery target address; pins ethertype to IPv6
    /// and protocol to ICMPv6, and reuses the L4 port fields for
    /// type/code as OVS itself does.
    pub fn nd_target(mut self, icmp_type: u16, addr: IpAddr, prefix_len: u8, icmp_code: u16) -> Self {
        self.m.eth_type = eth_type::IPV6;
        self.m.ip_proto = Some(58);
        self.m.tp_src = Some((icmp_type, 0xffff));
        self.m.tp_dst = Some((icmp_code, 0xffff));
        self.m.nd_target = Some(IpMatch { addr, prefix_len });
        self
    }

    pub fn proto(mut self, proto: u8) -> Self {
        self.m.ip_proto = Some(proto);
        self
    }

    pub fn tp_src(mut self, port: u16, mask: u16) -> Self {
        self.m.tp_src = Some((port, mask));
        self
    }

    pub fn tp_dst(mut self, port: u16, mask: u16) -> Self {
        self.m.tp_dst = Some((port, mask));
        self
    }

    pub fn tcp_flags(mut self, flags: u16, mask: u16) -> Self {
        self.m.tcp_flags = Some((flags, mask));
        self
    }

    pub fn vlan(mut self, vlan: u16) -> Self {
        self.m.vlan = Some(vlan);
        self
    }

    pub fn tun_id(mut self, tun_id: u64) -> Self {
        self.m.tun_id = Some(tun_id);
        self
    }

    pub fn reg(mut self, reg: Register, value: u32) -> Self {
        self.reg_masked(reg, value, u32::MAX)
    }

    pub fn reg_masked(mut self, reg: Register, value: u32, mask: u32) -> Self {
        self.m.regs.push(RegMatch { reg, value, mask });
        self
    }

    pub fn metadata(mut self, value: u64, mask: u64) -> Self {
        self.m.metadata = Some((value, mask));
        self
    }

    pub fn metadata_out(self, out: MetaOut) -> Self {
        self.metadata(out.as_bits(), MetaOut::MASK)
    }

    pub fn mark(mut self, value: u32, mask: u32) -> Self {
        self.m.pkt_mark = Some((value, mask));
        self
    }

    pub fn conntrack_state(mut self, state: u32, mask: u32) -> Self {
        self.m.ct_state = Some((state, mask));
        self
    }

    pub fn ct_mark(mut self, mark: u32, mask: u32) -> Self {
        self.m.ct_mark = Some((mark, mask));
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn actions(mut self, actions: impl IntoIterator<Item = Action>) -> Self {
        self.actions.extend(actions);
        self
    }

    pub fn go_to(self, table: TableId) -> Self {
        self.action(Action::GotoTable(table))
    }

    pub fn build(self) -> FlowEntry {
        FlowEntry {
            table: self.table,
            priority: self.priority,
            cookie: self.cookie,
            m: self.m,
            actions: self.actions,
            send_flow_removed: self.send_flow_removed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_basic_build() {
        let flow = FlowBuilder::new(TableId::Bridge)
            .priority(100)
            .in_port(OfPort::new(3))
            .go_to(TableId::Route)
            .build();

        assert_eq!(flow.table, TableId::Bridge);
        assert_eq!(flow.priority, 100);
        assert_eq!(flow.m.in_port, Some(OfPort::new(3)));
        assert_eq!(flow.actions, vec![Action::GotoTable(TableId::Route)]);
    }

    #[test]
    fn test_ip_src_infers_ethertype() {
        let flow = FlowBuilder::new(TableId::Route)
            .ip_src(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 0)), 24)
            .build();

        assert_eq!(flow.m.eth_type, eth_type::IP);
        assert!(flow.m.ip_src.is_some());
    }

    #[test]
    fn test_arp_gate_ignores_mismatched_ipv6_after_pin() {
        let flow = FlowBuilder::new(TableId::Src)
            .eth_type(eth_type::ARP)
            .ip_dst(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)), 32)
            .build();

        assert!(flow.m.ip_dst.is_some());
    }

    #[test]
    fn test_metadata_out_sets_bits_and_mask() {
        let flow = FlowBuilder::new(TableId::Out)
            .metadata_out(MetaOut::Tunnel)
            .build();

        assert_eq!(flow.m.metadata, Some((MetaOut::Tunnel.as_bits(), MetaOut::MASK)));
    }

    #[test]
    fn test_reg_default_mask_is_exact() {
        let flow = FlowBuilder::new(TableId::Src).reg(Register::Reg0, 42).build();
        assert_eq!(flow.m.regs[0].mask, u32::MAX);
    }
}
