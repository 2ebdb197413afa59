//! Safe Rust wrapper around the OpenFlow pipeline this agent drives.
//!
//! Where the teacher crate this was built from wrapped the hardware SAI API,
//! this crate wraps the OpenFlow wire model: flows, groups, the
//! [`conn::SwitchConnection`] transport trait, and the switch-manager
//! reconciliation engine. The actual wire encoding of `OFPT_FLOW_MOD` et al.
//! is out of scope — delegated to whatever codec crate a production binary
//! links `conn::SwitchConnection` to — so there is no FFI layer here, just
//! the type-safe builder and reconciliation logic above it.
//!
//! # Architecture
//!
//! - [`types`]: pipeline tables, registers, metadata bits, group ids
//! - [`flow`] / [`group`]: fluent flow-entry and group-entry construction
//! - [`rangemask`]: port-range to value/mask decomposition for classifiers
//! - [`conn`]: the `SwitchConnection` transport trait and a test double
//! - [`switchmgr`]: desired-state tracking and reconcile-on-reconnect
//! - [`error`]: `OFPT_ERROR` handling
//!
//! # Example
//!
//! ```
//! use opflex_ovs::flow::FlowBuilder;
//! use opflex_ovs::types::TableId;
//!
//! let flow = FlowBuilder::new(TableId::Bridge)
//!     .priority(100)
//!     .go_to(TableId::Route)
//!     .build();
//! assert_eq!(flow.table, TableId::Bridge);
//! ```

pub mod conn;
pub mod error;
pub mod flow;
pub mod group;
pub mod rangemask;
pub mod switchmgr;
pub mod types;

pub use conn::{match_key, ConnectionEvent, FlowStats, PacketIn, SwitchConnection, SwitchInventory};
pub use error::{OfpErrorType, OvsError, OvsResult};
pub use flow::{Action, FlowBuilder, FlowEntry, Match};
pub use group::{Bucket, GroupBuilder, GroupEntry};
pub use rangemask::{decompose as decompose_range, RangeMask};
pub use switchmgr::{SwitchManager, SwitchManagerStats};
pub use types::{GroupId, GroupType, MetaOut, Register, TableId};
