//! Common types for the policy-driven OpenFlow agent.
//!
//! This crate provides type-safe representations of the primitives shared by
//! every other crate in the workspace:
//!
//! - [`MacAddress`]: 48-bit Ethernet MAC addresses
//! - [`IpAddress`]: IPv4 and IPv6 addresses
//! - [`IpPrefix`]: IP network prefixes (CIDR notation)
//! - [`PortType`]: switch port classifications
//! - [`VlanId`]: IEEE 802.1Q VLAN identifiers
//! - [`Vnid`]: 24-bit encapsulation identifiers
//! - [`Uri`]: managed-object-database URIs
//! - [`Cookie`]: 64-bit OpenFlow flow cookies
//! - [`OfPort`]: OpenFlow port numbers

mod cookie;
mod ip;
mod mac;
mod ofport;
mod port;
mod uri;
mod vlan;
mod vnid;

pub use cookie::{Cookie, CookieClass};
pub use ip::{IpAddress, IpPrefix, Ipv4Address, Ipv6Address};
pub use mac::MacAddress;
pub use ofport::OfPort;
pub use port::{AdminState, OperState, PortRole, PortType};
pub use uri::Uri;
pub use vlan::VlanId;
pub use vnid::Vnid;

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid MAC address format: {0}")]
    InvalidMacAddress(String),

    #[error("invalid IP address format: {0}")]
    InvalidIpAddress(String),

    #[error("invalid IP prefix format: {0}")]
    InvalidIpPrefix(String),

    #[error("invalid VLAN ID: {0} (must be 1-4094)")]
    InvalidVlanId(u16),

    #[error("invalid port type: {0}")]
    InvalidPortType(String),

    #[error("invalid vnid: {0} (must fit in 24 bits)")]
    InvalidVnid(u32),

    #[error("invalid URI: {0}")]
    InvalidUri(String),
}
