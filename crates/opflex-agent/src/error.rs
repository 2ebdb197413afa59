//! Crate-wide error type.
//!
//! Mirrors the teacher's per-orch `XxxOrchError` pattern but collapsed into
//! one enum, since the translator core (C5/C6) shares a single failure
//! vocabulary across MODB resolution, flow synthesis and switch transport
//! rather than one error type per module.

use thiserror::Error;

/// Crate-wide error type realizing the error kinds of the agent's design.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    #[error("config parse error: {reason}")]
    ConfigParse { reason: String },

    #[error("bad config option {key}: {reason}")]
    BadConfigOption { key: String, reason: String },

    #[error("MODB invariant violated for {uri}: {reason}")]
    MODBInvariant { uri: String, reason: String },

    #[error("unknown port: {name}")]
    UnknownPort { name: String },

    #[error("invalid IP address: {value}")]
    InvalidIP { value: String },

    #[error("invalid MAC address: {value}")]
    InvalidMAC { value: String },

    #[error("invalid CIDR: {value}")]
    InvalidCIDR { value: String },

    #[error("switch transport error: {reason}")]
    SwitchTransport { reason: String },

    #[error("flow-mod rejected in table {table}: {reason}")]
    FlowModRejected { table: u8, reason: String },

    #[error("group-mod rejected for group {group}: {reason}")]
    GroupModRejected { group: u32, reason: String },

    #[error("encap mismatch: configured {configured}, fabric reports {fabric}")]
    EncapMismatch { configured: String, fabric: String },

    #[error("peer unreachable: {peer}")]
    PeerUnreachable { peer: String },
}

impl AgentError {
    /// Drives whether a per-URI task (in the C6 state machine) re-queues
    /// through the retry cache or transitions straight to `FAILED`.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AgentError::SwitchTransport { .. } | AgentError::PeerUnreachable { .. }
        )
    }

    /// True if this error should publish a critical fault object rather
    /// than only appearing in logs.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, AgentError::EncapMismatch { .. })
    }
}

impl From<opflex_ovs::OvsError> for AgentError {
    fn from(e: opflex_ovs::OvsError) -> Self {
        use opflex_ovs::OvsError;
        match &e {
            OvsError::FlowModRejected { table, .. } => AgentError::FlowModRejected {
                table: *table,
                reason: e.to_string(),
            },
            OvsError::GroupModRejected { group_id, .. } => AgentError::GroupModRejected {
                group: *group_id,
                reason: e.to_string(),
            },
            _ => AgentError::SwitchTransport { reason: e.to_string() },
        }
    }
}

pub type AgentResult<T> = std::result::Result<T, AgentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_errors_are_retryable() {
        let e = AgentError::SwitchTransport { reason: "closed".into() };
        assert!(e.is_retryable());
    }

    #[test]
    fn test_invariant_errors_are_not_retryable() {
        let e = AgentError::MODBInvariant { uri: "/g1/".into(), reason: "no bd".into() };
        assert!(!e.is_retryable());
    }

    #[test]
    fn test_encap_mismatch_is_user_visible() {
        let e = AgentError::EncapMismatch { configured: "vxlan".into(), fabric: "vlan".into() };
        assert!(e.is_user_visible());
    }
}
