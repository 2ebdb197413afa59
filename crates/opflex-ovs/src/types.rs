//! Pipeline-level types: tables, registers, metadata bits, and group ids.
//!
//! These are the vocabulary the flow/group builders and the switch manager
//! share. Port numbers, VNIDs, and cookies live in `opflex_types` since the
//! policy resolver needs them too; everything here is specific to how the
//! pipeline itself is wired.

use std::fmt;

/// One of the fifteen numbered tables in the integration pipeline.
///
/// Table order is a contract: a flow installed in one table that goes to
/// the next must use the next variant's [`TableId::as_u8`], never a literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TableId {
    DropLog,
    Sec,
    Src,
    SnatRev,
    ServiceRev,
    Bridge,
    ServiceNh,
    Route,
    Snat,
    NatIn,
    Learn,
    ServiceDst,
    Pol,
    Stats,
    Out,
    ExpDrop,
}

impl TableId {
    pub const ALL: [TableId; 16] = [
        TableId::DropLog,
        TableId::Sec,
        TableId::Src,
        TableId::SnatRev,
        TableId::ServiceRev,
        TableId::Bridge,
        TableId::ServiceNh,
        TableId::Route,
        TableId::Snat,
        TableId::NatIn,
        TableId::Learn,
        TableId::ServiceDst,
        TableId::Pol,
        TableId::Stats,
        TableId::Out,
        TableId::ExpDrop,
    ];

    /// The table's ordinal, as used on the wire.
    pub const fn as_u8(self) -> u8 {
        match self {
            TableId::DropLog => 0,
            TableId::Sec => 1,
            TableId::Src => 2,
            TableId::SnatRev => 3,
            TableId::ServiceRev => 4,
            TableId::Bridge => 5,
            TableId::ServiceNh => 6,
            TableId::Route => 7,
            TableId::Snat => 8,
            TableId::NatIn => 9,
            TableId::Learn => 10,
            TableId::ServiceDst => 11,
            TableId::Pol => 12,
            TableId::Stats => 13,
            TableId::Out => 14,
            TableId::ExpDrop => 15,
        }
    }

    pub fn from_u8(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_u8() == id)
    }

    /// The table this one falls through to when no flow matches, if any.
    /// `ExpDrop` has no next table; it is terminal.
    pub const fn default_next(self) -> Option<TableId> {
        match self {
            TableId::DropLog => Some(TableId::Sec),
            TableId::Sec => Some(TableId::Src),
            TableId::Src => Some(TableId::SnatRev),
            TableId::SnatRev => Some(TableId::ServiceRev),
            TableId::ServiceRev => Some(TableId::Bridge),
            TableId::Bridge => Some(TableId::ServiceNh),
            TableId::ServiceNh => Some(TableId::Route),
            TableId::Route => Some(TableId::Snat),
            TableId::Snat => Some(TableId::NatIn),
            TableId::NatIn => Some(TableId::Learn),
            TableId::Learn => Some(TableId::ServiceDst),
            TableId::ServiceDst => Some(TableId::Pol),
            TableId::Pol => Some(TableId::Stats),
            TableId::Stats => Some(TableId::Out),
            TableId::Out => Some(TableId::ExpDrop),
            TableId::ExpDrop => None,
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TableId::DropLog => "DROP_LOG",
            TableId::Sec => "SEC",
            TableId::Src => "SRC",
            TableId::SnatRev => "SNAT_REV",
            TableId::ServiceRev => "SERVICE_REV",
            TableId::Bridge => "BRIDGE",
            TableId::ServiceNh => "SERVICE_NH",
            TableId::Route => "ROUTE",
            TableId::Snat => "SNAT",
            TableId::NatIn => "NAT_IN",
            TableId::Learn => "LEARN",
            TableId::ServiceDst => "SERVICE_DST",
            TableId::Pol => "POL",
            TableId::Stats => "STATS",
            TableId::Out => "OUT",
            TableId::ExpDrop => "EXP_DROP",
        };
        write!(f, "{s}")
    }
}

/// Pipeline registers, per the register contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    /// Source EPG vnid
    Reg0,
    /// Destination EPG vnid
    Reg2,
    /// Bridge domain id
    Reg4,
    /// Flood domain id
    Reg5,
    /// Routing domain id
    Reg6,
    /// Output port / remote-tunnel target
    Reg7,
    /// Service virtual address, word 0 (v4, or v6 high)
    Reg8,
    /// Service virtual address, word 1
    Reg9,
    /// Service virtual address, word 2
    Reg10,
    /// Service virtual address, word 3 (v6 low)
    Reg11,
    /// Packet mark, carries rd-id for the host-stack reverse path
    PktMark,
}

impl Register {
    /// The NXM/OXM field name as it would appear in an OVS flow string.
    pub const fn nxm_name(self) -> &'static str {
        match self {
            Register::Reg0 => "reg0",
            Register::Reg2 => "reg2",
            Register::Reg4 => "reg4",
            Register::Reg5 => "reg5",
            Register::Reg6 => "reg6",
            Register::Reg7 => "reg7",
            Register::Reg8 => "reg8",
            Register::Reg9 => "reg9",
            Register::Reg10 => "reg10",
            Register::Reg11 => "reg11",
            Register::PktMark => "pkt_mark",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.nxm_name())
    }
}

/// The 3-bit `out` sub-field of the metadata register, selecting the
/// disposition a packet takes in the OUT table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MetaOut {
    /// Output to the port held in REG7
    #[default]
    Output,
    /// Resubmit to BRIDGE with source regs restored from REG7's EPG
    ResubmitDst,
    /// Apply outbound NAT, then resubmit with the mapped EPG as source
    Nat,
    /// Output to REG7, translating embedded ICMP error addresses
    RevNat,
    /// Encapsulate and output to the EPG's tunnel destination
    Tunnel,
    /// Output to the flood group for the packet's flood domain
    Flood,
    /// Output to a remote tunnel endpoint outside the local fabric
    RemoteTunnel,
    /// Output to a host-access interface bypassing the uplink
    HostAccess,
}

impl MetaOut {
    /// Bit pattern occupying bits 0-7 of the metadata register.
    pub const fn as_bits(self) -> u64 {
        match self {
            MetaOut::Output => 0x0,
            MetaOut::ResubmitDst => 0x1,
            MetaOut::Nat => 0x2,
            MetaOut::RevNat => 0x3,
            MetaOut::Tunnel => 0x4,
            MetaOut::Flood => 0x5,
            MetaOut::RemoteTunnel => 0x6,
            MetaOut::HostAccess => 0x7,
        }
    }

    pub const MASK: u64 = 0xff;
}

/// Metadata bits above the `out` sub-field.
pub mod meta {
    pub const POLICY_APPLIED: u64 = 1 << 8;
    pub const FROM_SERVICE_INTERFACE: u64 = 1 << 9;
    pub const ROUTED: u64 = 1 << 10;
    pub const DROP_LOG: u64 = 1 << 11;
}

/// An OpenFlow group identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u32);

impl GroupId {
    pub const fn new(id: u32) -> Self {
        GroupId(id)
    }

    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group{}", self.0)
    }
}

impl From<u32> for GroupId {
    fn from(id: u32) -> Self {
        GroupId(id)
    }
}

impl From<GroupId> for u32 {
    fn from(id: GroupId) -> Self {
        id.0
    }
}

/// OpenFlow group types; only `All` is used by flood-group construction but
/// the others are accepted so a group-mod builder stays general-purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GroupType {
    #[default]
    All,
    Select,
    Indirect,
    FastFailover,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_ordering_and_next() {
        assert_eq!(TableId::DropLog.as_u8(), 0);
        assert_eq!(TableId::ExpDrop.as_u8(), 15);
        assert_eq!(TableId::Sec.default_next(), Some(TableId::Src));
        assert_eq!(TableId::ExpDrop.default_next(), None);
    }

    #[test]
    fn test_table_from_u8_roundtrip() {
        for t in TableId::ALL {
            assert_eq!(TableId::from_u8(t.as_u8()), Some(t));
        }
        assert_eq!(TableId::from_u8(99), None);
    }

    #[test]
    fn test_table_display() {
        assert_eq!(TableId::Bridge.to_string(), "BRIDGE");
    }

    #[test]
    fn test_register_names() {
        assert_eq!(Register::Reg0.nxm_name(), "reg0");
        assert_eq!(Register::PktMark.to_string(), "pkt_mark");
    }

    #[test]
    fn test_meta_out_bits_fit_mask() {
        for m in [
            MetaOut::Output,
            MetaOut::ResubmitDst,
            MetaOut::Nat,
            MetaOut::RevNat,
            MetaOut::Tunnel,
            MetaOut::Flood,
            MetaOut::RemoteTunnel,
            MetaOut::HostAccess,
        ] {
            assert_eq!(m.as_bits() & !MetaOut::MASK, 0);
        }
        assert_eq!(MetaOut::RemoteTunnel.as_bits(), 0x6);
        assert_eq!(MetaOut::HostAccess.as_bits(), 0x7);
    }

    #[test]
    fn test_group_id() {
        let g = GroupId::from(42);
        assert_eq!(g.as_u32(), 42);
        assert_eq!(g.to_string(), "group42");
    }
}
