//! # huddle-store
//!
//! `SQLite` persistence for huddle: users, study groups, membership, and the
//! append-only chat message log.
//!
//! - [`connection`]: r2d2 pool construction with WAL + foreign keys
//! - [`migrations`]: schema versioned through `PRAGMA user_version`
//! - [`repositories`]: stateless per-table repositories taking `&Connection`
//! - [`store::SqliteStore`]: async facade implementing
//!   [`huddle_core::UserDirectory`] and [`huddle_core::MembershipStore`]

#![deny(unsafe_code)]

pub mod connection;
pub mod errors;
pub mod migrations;
pub mod repositories;
pub mod store;

pub use errors::{DbError, Result};
pub use store::SqliteStore;
