//! API endpoint modules.

pub mod case_runs;
pub mod health;
pub mod openapi;
pub mod statuses;
pub mod test_runs;

pub use case_runs::configure_routes as configure_case_run_routes;
pub use health::configure_health_routes;
pub use openapi::ApiDoc;
pub use statuses::configure_routes as configure_status_routes;
pub use test_runs::configure_routes as configure_run_routes;
