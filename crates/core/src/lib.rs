//! Domain logic for riskcast: submission validation, the result lifecycle,
//! probability payload handling, and the probability sources.
//!
//! Nothing in this crate touches the database.

pub mod config;
pub mod error;
pub mod probabilities;
pub mod result_state;
pub mod scripting;
pub mod source;
pub mod submission;
pub mod types;
