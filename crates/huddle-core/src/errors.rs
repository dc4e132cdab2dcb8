//! Error taxonomy for the chat core.
//!
//! - [`StoreError`]: failures reported by the persistent collaborators.
//! - [`ProtocolError`]: an inbound frame that cannot be interpreted.
//! - [`ChatError`]: everything a session can hit while processing a frame.
//!
//! Blank messages are not errors (they are silently dropped) and broker
//! bookkeeping never fails, so neither has a variant here.

use thiserror::Error;

use crate::ids::{GroupId, UserId};

/// RFC 6455 close code: protocol error.
pub const CLOSE_PROTOCOL: u16 = 1002;
/// RFC 6455 close code: payload inconsistent with the frame type.
pub const CLOSE_INVALID_PAYLOAD: u16 = 1007;
/// RFC 6455 close code: policy violation (used for unauthorized connections).
pub const CLOSE_POLICY: u16 = 1008;
/// RFC 6455 close code: unexpected server condition.
pub const CLOSE_INTERNAL: u16 = 1011;

/// Errors surfaced by a [`crate::MembershipStore`] or [`crate::UserDirectory`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The group does not exist (never did, or was deleted).
    #[error("group {0} not found")]
    GroupNotFound(GroupId),

    /// The user does not exist.
    #[error("user {0} not found")]
    UserNotFound(UserId),

    /// A uniqueness or membership rule rejected the write.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The store could not be reached (pool exhausted, worker gone).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(String),
}

/// An inbound frame that does not match the wire schema.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Binary frame whose bytes are not valid UTF-8.
    #[error("frame is not valid UTF-8")]
    InvalidUtf8,

    /// Not JSON, or JSON without a string `message` field.
    #[error("malformed frame: {0}")]
    MalformedJson(String),
}

impl ProtocolError {
    /// Close code to send when tearing down the connection.
    pub fn close_code(&self) -> u16 {
        match self {
            Self::InvalidUtf8 => CLOSE_INVALID_PAYLOAD,
            Self::MalformedJson(_) => CLOSE_PROTOCOL,
        }
    }
}

/// Failure while processing one inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// The frame could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The message could not be persisted; nothing was broadcast.
    #[error("persist failed: {0}")]
    Persistence(#[from] StoreError),

    /// The persist-then-broadcast task did not complete.
    #[error("delivery task failed: {0}")]
    Delivery(String),
}

impl ChatError {
    /// Whether the connection must be closed after this error.
    ///
    /// Protocol errors are always fatal. A persist failure is fatal only when
    /// the group itself is gone, since every later message would fail too;
    /// transient store trouble leaves the connection open.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Protocol(_) | Self::Persistence(StoreError::GroupNotFound(_)) => true,
            Self::Persistence(_) | Self::Delivery(_) => false,
        }
    }

    /// Close code to send when [`ChatError::is_fatal`] holds.
    pub fn close_code(&self) -> u16 {
        match self {
            Self::Protocol(e) => e.close_code(),
            Self::Persistence(_) | Self::Delivery(_) => CLOSE_INTERNAL,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "protocol",
            Self::Persistence(_) => "persistence",
            Self::Delivery(_) => "delivery",
        }
    }
}
