//! Decides whether a run is finished after its case runs change.
//!
//! Two mutually exclusive policies, selected per run by
//! `auto_update_run_status`:
//!
//! - automatic: the run closes once every case run is in a complete status
//!   and reopens as soon as one is not;
//! - manual: the run is closed and reopened only by explicit requests.
//!
//! A trigger of the other kind is ignored and leaves the stop date alone.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use crate::entity::test_run;
use crate::error::{AppError, AppResult};
use crate::models::{CompletionOutcome, CompletionTrigger, StatusSubtotal};

use super::run_stats::{completed_percentage, compute_subtotal};
use super::status_catalog::StatusCatalog;
use super::store::RunStore;

pub struct RunLifecycle {
    runs: Arc<dyn RunStore>,
    catalog: Arc<StatusCatalog>,
}

impl RunLifecycle {
    pub fn new(runs: Arc<dyn RunStore>, catalog: Arc<StatusCatalog>) -> Self {
        Self { runs, catalog }
    }

    /// Load a run, failing with NotFound.
    pub async fn run(&self, run_id: i32) -> AppResult<test_run::Model> {
        self.runs
            .find_run(run_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Test run {}", run_id)))
    }

    /// Status distribution of a run's case runs.
    pub async fn subtotal(&self, run_id: i32) -> AppResult<StatusSubtotal> {
        self.run(run_id).await?;
        self.compute(run_id).await
    }

    async fn compute(&self, run_id: i32) -> AppResult<StatusSubtotal> {
        let known = self.catalog.all().await?;
        let tallies = self.runs.count_case_runs_by_status(run_id).await?;
        Ok(compute_subtotal(&known, &tallies))
    }

    /// Apply a completion trigger to a run and persist the resulting stop date.
    pub async fn update_completion_status(
        &self,
        run_id: i32,
        trigger: CompletionTrigger,
    ) -> AppResult<CompletionOutcome> {
        let run = self.run(run_id).await?;

        let finish = match trigger {
            CompletionTrigger::Automatic if run.auto_update_run_status => {
                let subtotal = self.compute(run_id).await?;
                let percent = completed_percentage(&subtotal);
                debug!(run_id, percent, total = subtotal.total, "Run completion recomputed");
                percent == 100.0
            }
            CompletionTrigger::Manual { finish } if !run.auto_update_run_status => finish,
            _ => {
                debug!(
                    run_id,
                    automatic = trigger.is_automatic(),
                    auto_update_run_status = run.auto_update_run_status,
                    "Completion trigger does not match run policy, ignoring"
                );
                return Ok(CompletionOutcome::Ignored);
            }
        };

        if finish {
            let stop_date = Utc::now();
            self.runs.set_run_stop_date(run_id, Some(stop_date)).await?;
            info!(run_id, %stop_date, "Test run finished");
            Ok(CompletionOutcome::Finished { stop_date })
        } else {
            self.runs.set_run_stop_date(run_id, None).await?;
            if run.stop_date.is_some() {
                info!(run_id, "Test run reopened");
            }
            Ok(CompletionOutcome::Reopened)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::status_catalog::StatusCache;
    use crate::test_support::InMemoryStore;

    const IDLE: i32 = 1;
    const PASSED: i32 = 2;
    const FAILED: i32 = 3;

    fn lifecycle(store: &Arc<InMemoryStore>) -> RunLifecycle {
        let catalog = Arc::new(StatusCatalog::new(store.clone(), StatusCache::default()));
        RunLifecycle::new(store.clone(), catalog)
    }

    #[tokio::test]
    async fn test_automatic_run_closes_and_reopens() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let lifecycle = lifecycle(&store);
        let run_id = store.insert_run(true);
        let first = store.add_case_run(run_id, PASSED);
        store.add_case_run(run_id, FAILED);

        let outcome = lifecycle
            .update_completion_status(run_id, CompletionTrigger::Automatic)
            .await
            .unwrap();
        assert!(matches!(outcome, CompletionOutcome::Finished { .. }));
        assert!(store.run(run_id).unwrap().stop_date.is_some());

        store.set_case_run_status(first, IDLE);
        let outcome = lifecycle
            .update_completion_status(run_id, CompletionTrigger::Automatic)
            .await
            .unwrap();
        assert_eq!(outcome, CompletionOutcome::Reopened);
        assert!(store.run(run_id).unwrap().stop_date.is_none());
    }

    #[tokio::test]
    async fn test_automatic_run_without_case_runs_stays_open() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let lifecycle = lifecycle(&store);
        let run_id = store.insert_run(true);

        let outcome = lifecycle
            .update_completion_status(run_id, CompletionTrigger::Automatic)
            .await
            .unwrap();
        assert_eq!(outcome, CompletionOutcome::Reopened);
        assert!(store.run(run_id).unwrap().stop_date.is_none());
    }

    #[tokio::test]
    async fn test_manual_run_follows_directive() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let lifecycle = lifecycle(&store);
        let run_id = store.insert_run(false);
        store.add_case_run(run_id, IDLE);

        let outcome = lifecycle
            .update_completion_status(run_id, CompletionTrigger::Manual { finish: true })
            .await
            .unwrap();
        assert!(matches!(outcome, CompletionOutcome::Finished { .. }));
        assert!(store.run(run_id).unwrap().stop_date.is_some());

        lifecycle
            .update_completion_status(run_id, CompletionTrigger::Manual { finish: false })
            .await
            .unwrap();
        assert!(store.run(run_id).unwrap().stop_date.is_none());
    }

    #[tokio::test]
    async fn test_manual_trigger_ignored_on_automatic_run() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let lifecycle = lifecycle(&store);
        let run_id = store.insert_run(true);
        store.add_case_run(run_id, IDLE);

        let outcome = lifecycle
            .update_completion_status(run_id, CompletionTrigger::Manual { finish: true })
            .await
            .unwrap();
        assert_eq!(outcome, CompletionOutcome::Ignored);
        assert!(store.run(run_id).unwrap().stop_date.is_none());
        assert_eq!(store.stop_date_writes(), 0);
    }

    #[tokio::test]
    async fn test_automatic_trigger_ignored_on_manual_run() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let lifecycle = lifecycle(&store);
        let run_id = store.insert_run(false);
        store.add_case_run(run_id, PASSED);

        lifecycle
            .update_completion_status(run_id, CompletionTrigger::Manual { finish: true })
            .await
            .unwrap();
        let closed_at = store.run(run_id).unwrap().stop_date;
        assert!(closed_at.is_some());

        // Regress below 100% and fire an automatic trigger; the manual close stands.
        store.add_case_run(run_id, IDLE);
        let outcome = lifecycle
            .update_completion_status(run_id, CompletionTrigger::Automatic)
            .await
            .unwrap();
        assert_eq!(outcome, CompletionOutcome::Ignored);
        assert_eq!(store.run(run_id).unwrap().stop_date, closed_at);
    }

    #[tokio::test]
    async fn test_missing_run_is_not_found() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let lifecycle = lifecycle(&store);

        assert!(matches!(
            lifecycle
                .update_completion_status(404, CompletionTrigger::Automatic)
                .await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            lifecycle.subtotal(404).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_subtotal_reflects_case_runs() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let lifecycle = lifecycle(&store);
        let run_id = store.insert_run(true);
        store.add_case_run(run_id, PASSED);
        store.add_case_run(run_id, PASSED);
        store.add_case_run(run_id, FAILED);
        store.add_case_run(run_id, IDLE);

        let subtotal = lifecycle.subtotal(run_id).await.unwrap();
        assert_eq!(subtotal.total, 4);
        assert_eq!(subtotal.complete_percent, 75.0);
        assert_eq!(subtotal.per_status.len(), 8);
    }
}
