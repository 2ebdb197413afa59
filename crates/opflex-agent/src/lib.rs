//! opflex-agent - OpFlex policy-driven OpenFlow agent
//!
//! This crate translates policy objects resolved from a managed object
//! database (endpoints, EPGs, contracts, subnets, services) into OpenFlow
//! flows and groups on a local Open vSwitch integration bridge, and reacts to
//! packets punted up from that bridge (ARP/ND, DHCP, ICMPv4 echo/error, VIP
//! announcements).
//!
//! # Architecture
//!
//! ```text
//! [Policy resolver] ──> [IntegrationFlowManager] ──> [SwitchConnection] ──> [OVS bridge]
//!                                                           │
//!                                                           ↓
//!                                                   [PacketInHandler]
//! ```
//!
//! # Key Components
//!
//! - [`daemon::OrchDaemon`]: main event loop and Orch coordination
//! - [`intflow`]: turns resolved policy into integration-bridge flows/groups
//! - [`packetin`]: handles packets punted to the controller (ARP/ND, DHCP,
//!   ICMP echo/error, VIP announcements)
//! - [`stats`]: polls per-table drop-flow counters
//! - [`advert`]: periodic endpoint and tunnel-endpoint address advertisement
//! - [`policy`]: resolved policy object model and the MODB resolver
//! - [`config`]: static agent configuration

pub mod advert;
pub mod audit;
pub mod config;
pub mod daemon;
pub mod error;
pub mod idgen;
pub mod intflow;
pub mod packetin;
pub mod policy;
pub mod portmap;
pub mod stats;
