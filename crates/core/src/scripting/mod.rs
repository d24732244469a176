//! Subprocess execution for external probability scripts.
//!
//! All process management is pure (no DB access) and lives in the `core`
//! crate so it can be tested in isolation.

pub mod executor;
pub mod subprocess;
