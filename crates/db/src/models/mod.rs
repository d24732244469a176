//! Row models and DTOs.
//!
//! Each submodule contains a `FromRow` + `Serialize` struct matching the
//! database row, plus the insert DTOs its repository accepts.

pub mod job;
pub mod status;
pub mod weather_result;
