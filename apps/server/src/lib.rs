//! Test Run Tracker library.
//!
//! Test runs and their case runs, the case run status catalog, run status
//! subtotals and the run completion lifecycle, exposed over an HTTP API.

pub mod api;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
