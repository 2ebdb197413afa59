//! 24-bit encapsulation identifier (VXLAN VNI / VLAN tag class id).

use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A 24-bit encapsulation identifier carried in a VXLAN VNI or VLAN tag.
///
/// External-network vnids have bit 31 set by the id generator (§4.5 of the
/// forwarding-info computation) to distinguish them from ordinary EPG vnids;
/// `Vnid` stores the full 32-bit value so that distinction survives, but
/// [`Vnid::new`] only accepts values that fit in 24 bits for the ordinary
/// case. Use [`Vnid::from_raw`] to construct a value with the external bit
/// already set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vnid(u32);

impl Vnid {
    /// Bit marking an id as belonging to an external network rather than a
    /// real EPG vnid.
    pub const EXTERNAL_BIT: u32 = 1 << 31;

    /// Largest value that fits in 24 bits.
    pub const MAX: u32 = 0x00ff_ffff;

    /// Creates a new vnid, rejecting values that don't fit in 24 bits.
    pub const fn new(id: u32) -> Result<Self, ParseError> {
        if id <= Self::MAX {
            Ok(Vnid(id))
        } else {
            Err(ParseError::InvalidVnid(id))
        }
    }

    /// Wraps a raw 32-bit value without range checking, for ids that may
    /// carry [`Vnid::EXTERNAL_BIT`].
    pub const fn from_raw(id: u32) -> Self {
        Vnid(id)
    }

    /// Returns the raw 32-bit value.
    pub const fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns true if this id was allocated for an external network.
    pub const fn is_external(&self) -> bool {
        self.0 & Self::EXTERNAL_BIT != 0
    }
}

impl fmt::Display for Vnid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Vnid {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id: u32 = s.parse().map_err(|_| ParseError::InvalidVnid(0))?;
        Vnid::new(id)
    }
}

impl TryFrom<u32> for Vnid {
    type Error = ParseError;

    fn try_from(id: u32) -> Result<Self, Self::Error> {
        Vnid::new(id)
    }
}

impl From<Vnid> for u32 {
    fn from(vnid: Vnid) -> u32 {
        vnid.0
    }
}
