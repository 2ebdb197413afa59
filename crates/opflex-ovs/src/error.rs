//! OpenFlow error types and status handling.
//!
//! This module provides safe error handling for switch operations,
//! converting `OFPT_ERROR` messages into Rust's Result type.

use std::fmt;
use thiserror::Error;

/// OpenFlow error type codes, matching `ofp_error_type` in the wire
/// protocol.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OfpErrorType {
    HelloFailed = 0,
    BadRequest = 1,
    BadAction = 2,
    BadInstruction = 3,
    BadMatch = 4,
    FlowModFailed = 5,
    GroupModFailed = 6,
    PortModFailed = 7,
    TableModFailed = 8,
    QueueOpFailed = 9,
    SwitchConfigFailed = 10,
    RoleRequestFailed = 11,
    MeterModFailed = 12,
    TableFeaturesFailed = 13,
}

impl OfpErrorType {
    /// Creates an `OfpErrorType` from a raw `ofp_error_type` value.
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => OfpErrorType::HelloFailed,
            1 => OfpErrorType::BadRequest,
            2 => OfpErrorType::BadAction,
            3 => OfpErrorType::BadInstruction,
            4 => OfpErrorType::BadMatch,
            5 => OfpErrorType::FlowModFailed,
            6 => OfpErrorType::GroupModFailed,
            7 => OfpErrorType::PortModFailed,
            8 => OfpErrorType::TableModFailed,
            9 => OfpErrorType::QueueOpFailed,
            10 => OfpErrorType::SwitchConfigFailed,
            11 => OfpErrorType::RoleRequestFailed,
            12 => OfpErrorType::MeterModFailed,
            13 => OfpErrorType::TableFeaturesFailed,
            _ => OfpErrorType::BadRequest,
        }
    }
}

impl fmt::Display for OfpErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OfpErrorType::HelloFailed => "OFPET_HELLO_FAILED",
            OfpErrorType::BadRequest => "OFPET_BAD_REQUEST",
            OfpErrorType::BadAction => "OFPET_BAD_ACTION",
            OfpErrorType::BadInstruction => "OFPET_BAD_INSTRUCTION",
            OfpErrorType::BadMatch => "OFPET_BAD_MATCH",
            OfpErrorType::FlowModFailed => "OFPET_FLOW_MOD_FAILED",
            OfpErrorType::GroupModFailed => "OFPET_GROUP_MOD_FAILED",
            OfpErrorType::PortModFailed => "OFPET_PORT_MOD_FAILED",
            OfpErrorType::TableModFailed => "OFPET_TABLE_MOD_FAILED",
            OfpErrorType::QueueOpFailed => "OFPET_QUEUE_OP_FAILED",
            OfpErrorType::SwitchConfigFailed => "OFPET_SWITCH_CONFIG_FAILED",
            OfpErrorType::RoleRequestFailed => "OFPET_ROLE_REQUEST_FAILED",
            OfpErrorType::MeterModFailed => "OFPET_METER_MOD_FAILED",
            OfpErrorType::TableFeaturesFailed => "OFPET_TABLE_FEATURES_FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Error type for switch connection and flow-mod operations.
#[derive(Debug, Clone, Error)]
pub enum OvsError {
    /// The switch rejected a flow-mod with an `OFPT_ERROR` reply.
    #[error("flow-mod rejected on table {table}: {reason}")]
    FlowModRejected { table: u8, reason: String },

    /// The switch rejected a group-mod with an `OFPT_ERROR` reply.
    #[error("group-mod rejected for group {group_id}: {reason}")]
    GroupModRejected { group_id: u32, reason: String },

    /// The connection to the switch is down.
    #[error("switch connection lost: {0}")]
    ConnectionLost(String),

    /// The requested feature is not supported by the connected switch.
    #[error("feature not supported: {feature}")]
    NotSupported { feature: String },

    /// Invalid parameter passed to a builder or switch call.
    #[error("invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// The requested item (port, flow, group) was not found.
    #[error("item not found: {item}")]
    NotFound { item: String },

    /// The item already exists.
    #[error("item already exists: {item}")]
    AlreadyExists { item: String },

    /// The switch's flow or group table is full.
    #[error("table full: {table}")]
    TableFull { table: String },

    /// No connection has been established yet.
    #[error("switch connection not initialized")]
    Uninitialized,

    /// Internal error.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl OvsError {
    /// Builds an error from a raw `(type, code)` pair as seen in an
    /// `OFPT_ERROR` message, with a human-readable reason already extracted
    /// from the embedded request data.
    pub fn from_ofp_error(error_type: i32, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        match OfpErrorType::from_raw(error_type) {
            OfpErrorType::FlowModFailed => OvsError::FlowModRejected { table: 0, reason },
            OfpErrorType::GroupModFailed => OvsError::GroupModRejected { group_id: 0, reason },
            _ => OvsError::Internal { message: reason },
        }
    }

    /// Creates a not-supported error with a feature description.
    pub fn not_supported(feature: impl Into<String>) -> Self {
        OvsError::NotSupported {
            feature: feature.into(),
        }
    }

    /// Creates an invalid-parameter error with a message.
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        OvsError::InvalidParameter {
            message: message.into(),
        }
    }

    /// Creates a not-found error with an item description.
    pub fn not_found(item: impl Into<String>) -> Self {
        OvsError::NotFound { item: item.into() }
    }

    /// Creates an already-exists error.
    pub fn already_exists(item: impl Into<String>) -> Self {
        OvsError::AlreadyExists { item: item.into() }
    }

    /// Creates a table-full error.
    pub fn table_full(table: impl Into<String>) -> Self {
        OvsError::TableFull {
            table: table.into(),
        }
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        OvsError::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error is worth retrying (transient connection
    /// trouble) rather than a permanent rejection.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OvsError::ConnectionLost(_) | OvsError::Uninitialized)
    }
}

/// Result type for switch operations.
pub type OvsResult<T> = Result<T, OvsError>;
