//! Repositories: one zero-sized struct per table, all methods take `&PgPool`.

pub mod job_repo;
pub mod weather_result_repo;

pub use job_repo::JobRepo;
pub use weather_result_repo::WeatherResultRepo;
