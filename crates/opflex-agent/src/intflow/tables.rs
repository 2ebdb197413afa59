//! Shared pipeline vocabulary for the Integration Flow Manager.
//!
//! Registers and metadata are an API between tables (design note): this
//! module is the single place that names them, plus the small conversion
//! helpers every flow-synthesis module needs between the policy data
//! model's address types and [`opflex_ovs::flow`]'s `std::net::IpAddr`.

use std::net::IpAddr;

use opflex_types::IpAddress;

pub use opflex_ovs::types::{meta, GroupId, GroupType, MetaOut, Register, TableId};

/// Converts the policy model's [`IpAddress`] into the `std::net::IpAddr`
/// the flow builder's match fields use.
pub fn to_std_ip(addr: IpAddress) -> IpAddr {
    match addr {
        IpAddress::V4(v4) => IpAddr::V4(v4.into()),
        IpAddress::V6(v6) => IpAddr::V6(v6.into()),
    }
}

/// Default priority band for generated flows; contract rules shift this
/// down by rule order, so this is deliberately high.
pub const DEFAULT_PRIORITY: u16 = 100;
pub const STATIC_FLOW_PRIORITY: u16 = 1;
pub const TABLE_DROP_PRIORITY: u16 = 0;
