//! Persistence seams used by the run services.
//!
//! `DbPool` implements both traits against PostgreSQL; tests use
//! `crate::test_support::InMemoryStore`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entity::test_run;
use crate::error::AppResult;
use crate::models::{NewStatus, StatusDefinition, StatusTally};

/// Storage of the case run status catalog.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// All statuses ordered by id.
    async fn list_statuses(&self) -> AppResult<Vec<StatusDefinition>>;

    /// Exact match on the canonical (upper-case) name.
    async fn find_status_by_name(&self, name: &str) -> AppResult<Option<StatusDefinition>>;

    async fn find_status_by_id(&self, id: i32) -> AppResult<Option<StatusDefinition>>;

    async fn insert_status(&self, status: NewStatus) -> AppResult<StatusDefinition>;

    async fn update_status_name(&self, id: i32, name: &str) -> AppResult<StatusDefinition>;

    /// Number of case runs currently in the status.
    async fn count_case_runs_with_status(&self, id: i32) -> AppResult<u64>;

    async fn delete_status(&self, id: i32) -> AppResult<()>;
}

/// Run-side reads and writes needed by lifecycle, housekeeping and notification.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn find_run(&self, run_id: i32) -> AppResult<Option<test_run::Model>>;

    /// Case runs of the run grouped by status id.
    async fn count_case_runs_by_status(&self, run_id: i32) -> AppResult<Vec<StatusTally>>;

    async fn set_run_stop_date(
        &self,
        run_id: i32,
        stop_date: Option<DateTime<Utc>>,
    ) -> AppResult<test_run::Model>;

    /// Addresses of the manager, CC list, default tester and case run assignees.
    /// May contain duplicates and empty strings.
    async fn run_recipient_emails(&self, run_id: i32) -> AppResult<Vec<String>>;

    /// Remove link references and bug associations of a case run.
    /// Returns the number of removed records.
    async fn remove_case_run_attachments(&self, case_run_id: i32) -> AppResult<u64>;
}
