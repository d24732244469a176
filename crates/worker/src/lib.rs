//! Background processing for weather results.
//!
//! [`job::WeatherProbabilityJob`] drives one record from `pending` to a
//! terminal state. [`runner::JobRunner`] claims queued jobs and runs it.

pub mod config;
pub mod error;
pub mod job;
pub mod runner;
pub mod source;
pub mod store;
