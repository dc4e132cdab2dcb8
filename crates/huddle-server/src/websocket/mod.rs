//! Chat connections: fan-out registry, per-connection session, and transport.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `broker` | Group → connections registry with per-group locking and fan-out |
//! | `connection` | Outbound queue, drop accounting, and eviction signal for one client |
//! | `session` | Admission and the per-frame persist-then-broadcast state machine |
//! | `handler` | Axum upgrade, socket read loop, writer task, close frames |
//!
//! ## Data Flow
//!
//! `handler` → `session` (verify, persist) → `broker` → every `connection` in the group.

pub mod broker;
pub mod connection;
pub mod handler;
pub mod session;
