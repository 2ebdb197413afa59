//! Integration Flow Manager (C6): turns resolved policy objects into the
//! OpenFlow state installed on the integration bridge.
//!
//! Each submodule builds the flows/groups for one kind of policy object;
//! [`orch::IntegrationFlowManager`] is the `Orch` that drives them off the
//! per-entity update queues.

pub mod contract;
pub mod endpoint;
pub mod epg;
pub mod flood;
pub mod mcast;
pub mod orch;
pub mod remote;
pub mod service;
pub mod snat;
pub mod static_flows;
pub mod tables;

pub use orch::IntegrationFlowManager;
