//! OpenFlow port number newtype.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An OpenFlow port number, as used in `in_port` matches and `output`
/// actions.
///
/// Values `0xffff_ff00` and above are reserved OpenFlow port numbers
/// (`CONTROLLER`, `LOCAL`, `ALL`, ...); [`OfPort`] stores them like any other
/// value but exposes [`OfPort::CONTROLLER`] and [`OfPort::LOCAL`] as named
/// constants for convenience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfPort(u32);

impl OfPort {
    /// Reserved port: deliver to the controller.
    pub const CONTROLLER: OfPort = OfPort(0xffff_fffd);

    /// Reserved port: the switch's local (management) port.
    pub const LOCAL: OfPort = OfPort(0xffff_fffe);

    /// Reserved port: all ports except the input port.
    pub const ALL: OfPort = OfPort(0xffff_fffc);

    /// Reserved port: submit to the first matching flow in the current
    /// table, i.e. resubmit.
    pub const IN_PORT: OfPort = OfPort(0xffff_fff8);

    /// Sentinel meaning "no port assigned yet".
    pub const NONE: OfPort = OfPort(0);

    /// Creates a new port number from a raw `u32`.
    pub const fn new(port: u32) -> Self {
        OfPort(port)
    }

    /// Returns the raw port number.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns true if this is [`OfPort::NONE`].
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if this is one of the reserved OpenFlow port numbers
    /// rather than a physical switch port.
    pub const fn is_reserved(&self) -> bool {
        self.0 >= 0xffff_ff00
    }
}

impl Default for OfPort {
    fn default() -> Self {
        OfPort::NONE
    }
}

impl fmt::Display for OfPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for OfPort {
    fn from(port: u32) -> Self {
        OfPort(port)
    }
}

impl From<OfPort> for u32 {
    fn from(port: OfPort) -> u32 {
        port.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_none_default() {
        assert!(OfPort::default().is_none());
        assert!(OfPort::NONE.is_none());
    }

    #[test]
    fn test_physical_port_not_reserved() {
        let port = OfPort::new(7);
        assert!(!port.is_reserved());
        assert_eq!(port.as_u32(), 7);
    }

    #[test]
    fn test_reserved_ports() {
        assert!(OfPort::CONTROLLER.is_reserved());
        assert!(OfPort::LOCAL.is_reserved());
        assert!(OfPort::ALL.is_reserved());
        assert!(OfPort::IN_PORT.is_reserved());
    }

    #[test]
    fn test_display() {
        assert_eq!(OfPort::new(7).to_string(), "7");
    }
}
