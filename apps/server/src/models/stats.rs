//! Run statistics models.

use serde::Serialize;
use utoipa::ToSchema;

use super::status::StatusDefinition;

/// Number of case runs of one run in one status, as grouped by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusTally {
    pub status_id: i32,
    pub count: u64,
}

/// Count of case runs for one catalog status.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatusCount {
    pub status: StatusDefinition,
    pub count: u64,
}

/// Status distribution of a run's case runs.
///
/// `per_status` has one entry per known status, ordered by status id, including
/// statuses no case run is in.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct StatusSubtotal {
    pub per_status: Vec<StatusCount>,
    pub total: u64,
    pub complete_count: u64,
    pub failure_count: u64,
    /// Share of all case runs that are in a complete status.
    pub complete_percent: f64,
    /// Share of *completed* case runs that are in a failure status.
    pub failure_percent: f64,
}

impl StatusSubtotal {
    /// Count for a status name (0 when the status is unknown).
    pub fn count_for(&self, name: &str) -> u64 {
        self.per_status
            .iter()
            .find(|entry| entry.status.name == name)
            .map(|entry| entry.count)
            .unwrap_or(0)
    }
}

/// Case runs of a run split by the automation flag of their test case.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct AutomationCounts {
    pub automated: u64,
    pub manual: u64,
    /// Cases flagged as both manual and automated.
    pub both: u64,
}

/// Response for the run statistics endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunStatsResponse {
    pub run_id: i32,
    pub subtotal: StatusSubtotal,
    /// Completion rounded to two decimals, as used for automatic closing.
    pub completed_percentage: f64,
    pub bug_count: u64,
    pub automation: AutomationCounts,
}
