//! # huddle-core
//!
//! Foundation types, errors, branded IDs, and collaborator traits for huddle.
//!
//! This crate provides the shared vocabulary that the other huddle crates depend on:
//!
//! - **Branded IDs**: [`ids::UserId`], [`ids::GroupId`], [`ids::MessageId`], [`ids::ConnectionId`]
//! - **Models**: [`models::User`], [`models::Group`], [`models::ChatMessage`], [`models::Identity`]
//! - **Wire frames**: [`frames::InboundFrame`] and [`frames::OutboundFrame`]
//! - **Errors**: [`errors::StoreError`], [`errors::ProtocolError`], [`errors::ChatError`]
//! - **Collaborators**: [`directory::UserDirectory`] and [`directory::MembershipStore`]
//! - **Logging**: [`logging::init_subscriber`]
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other huddle crates.

#![deny(unsafe_code)]

pub mod directory;
pub mod errors;
pub mod frames;
pub mod ids;
pub mod logging;
pub mod models;

pub use directory::{MembershipStore, UserDirectory};
pub use errors::{ChatError, ProtocolError, StoreError};
pub use frames::{InboundFrame, OutboundFrame, format_timestamp};
pub use ids::{ConnectionId, GroupId, MessageId, UserId};
pub use models::{ChatMessage, Group, HistoryEntry, Identity, User};
