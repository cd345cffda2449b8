//! Test-only helpers: an in-memory store and a recording mailer.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entity::test_run;
use crate::error::{AppError, AppResult};
use crate::models::status::{BLOCKED, ERROR, FAILED, IDLE, PASSED, PAUSED, RUNNING, WAIVED};
use crate::models::{NewStatus, StatusDefinition, StatusTally};
use crate::services::notification::{Mailer, OutgoingMail};
use crate::services::store::{RunStore, StatusStore};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The seeded status catalog, ids 1..=8.
pub fn default_statuses() -> Vec<StatusDefinition> {
    [IDLE, PASSED, FAILED, RUNNING, PAUSED, BLOCKED, ERROR, WAIVED]
        .iter()
        .zip(1..)
        .map(|(name, id)| StatusDefinition {
            id,
            name: name.to_string(),
            sortkey: id,
            description: None,
            auto_blinddown: true,
        })
        .collect()
}

/// A run with deterministic fields.
pub fn run_model(id: i32, auto_update_run_status: bool) -> test_run::Model {
    test_run::Model {
        id,
        summary: format!("Run {}", id),
        notes: String::new(),
        plan_id: 1,
        plan_text_version: 1,
        product_version_id: 1,
        build_id: 1,
        manager_id: 1,
        default_tester_id: None,
        environment_id: 0,
        estimated_time_secs: 0,
        auto_update_run_status,
        start_date: DateTime::from_timestamp(1_704_099_600, 0).unwrap_or_default(),
        stop_date: None,
    }
}

#[derive(Debug, Clone, Copy)]
struct MemoryCaseRun {
    run_id: i32,
    status_id: i32,
}

/// In-memory implementation of the status and run stores.
#[derive(Default)]
pub struct InMemoryStore {
    statuses: Mutex<Vec<StatusDefinition>>,
    runs: Mutex<BTreeMap<i32, test_run::Model>>,
    case_runs: Mutex<BTreeMap<i32, MemoryCaseRun>>,
    recipients: Mutex<HashMap<i32, Vec<String>>>,
    attachments: Mutex<HashMap<i32, u64>>,
    next_id: AtomicUsize,
    status_reads: AtomicUsize,
    stop_date_writes: AtomicUsize,
}

impl InMemoryStore {
    pub fn with_default_statuses() -> Self {
        let store = Self::default();
        *lock(&store.statuses) = default_statuses();
        store
    }

    fn next_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::SeqCst) as i32 + 1
    }

    /// Insert an open run and return its id.
    pub fn insert_run(&self, auto_update_run_status: bool) -> i32 {
        let id = self.next_id();
        lock(&self.runs).insert(id, run_model(id, auto_update_run_status));
        id
    }

    pub fn run(&self, run_id: i32) -> Option<test_run::Model> {
        lock(&self.runs).get(&run_id).cloned()
    }

    /// Attach a case run in `status_id` and return its id.
    pub fn add_case_run(&self, run_id: i32, status_id: i32) -> i32 {
        let id = self.next_id();
        lock(&self.case_runs).insert(id, MemoryCaseRun { run_id, status_id });
        id
    }

    pub fn set_case_run_status(&self, case_run_id: i32, status_id: i32) {
        if let Some(case_run) = lock(&self.case_runs).get_mut(&case_run_id) {
            case_run.status_id = status_id;
        }
    }

    pub fn remove_case_run(&self, case_run_id: i32) {
        lock(&self.case_runs).remove(&case_run_id);
    }

    pub fn set_recipients(&self, run_id: i32, recipients: Vec<&str>) {
        lock(&self.recipients).insert(
            run_id,
            recipients.into_iter().map(str::to_string).collect(),
        );
    }

    /// Record `count` link references/bug associations for a case run.
    pub fn set_attachments(&self, case_run_id: i32, count: u64) {
        lock(&self.attachments).insert(case_run_id, count);
    }

    pub fn attachments(&self, case_run_id: i32) -> u64 {
        lock(&self.attachments)
            .get(&case_run_id)
            .copied()
            .unwrap_or(0)
    }

    /// Number of status lookups that reached the store.
    pub fn status_reads(&self) -> usize {
        self.status_reads.load(Ordering::SeqCst)
    }

    /// Number of persisted stop date changes.
    pub fn stop_date_writes(&self) -> usize {
        self.stop_date_writes.load(Ordering::SeqCst)
    }

    fn read_statuses(&self) -> MutexGuard<'_, Vec<StatusDefinition>> {
        self.status_reads.fetch_add(1, Ordering::SeqCst);
        lock(&self.statuses)
    }
}

#[async_trait]
impl StatusStore for InMemoryStore {
    async fn list_statuses(&self) -> AppResult<Vec<StatusDefinition>> {
        Ok(self.read_statuses().clone())
    }

    async fn find_status_by_name(&self, name: &str) -> AppResult<Option<StatusDefinition>> {
        Ok(self
            .read_statuses()
            .iter()
            .find(|s| s.name == name)
            .cloned())
    }

    async fn find_status_by_id(&self, id: i32) -> AppResult<Option<StatusDefinition>> {
        Ok(self.read_statuses().iter().find(|s| s.id == id).cloned())
    }

    async fn insert_status(&self, status: NewStatus) -> AppResult<StatusDefinition> {
        let mut statuses = lock(&self.statuses);
        let id = statuses.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        let created = StatusDefinition {
            id,
            name: status.name,
            sortkey: status.sortkey,
            description: status.description,
            auto_blinddown: status.auto_blinddown,
        };
        statuses.push(created.clone());
        Ok(created)
    }

    async fn update_status_name(&self, id: i32, name: &str) -> AppResult<StatusDefinition> {
        let mut statuses = lock(&self.statuses);
        let status = statuses
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Case run status {}", id)))?;
        status.name = name.to_string();
        Ok(status.clone())
    }

    async fn count_case_runs_with_status(&self, id: i32) -> AppResult<u64> {
        Ok(lock(&self.case_runs)
            .values()
            .filter(|case_run| case_run.status_id == id)
            .count() as u64)
    }

    async fn delete_status(&self, id: i32) -> AppResult<()> {
        if self.count_case_runs_with_status(id).await? > 0 {
            return Err(AppError::InvalidInput(format!(
                "Case run status {} is in use",
                id
            )));
        }
        let mut statuses = lock(&self.statuses);
        let before = statuses.len();
        statuses.retain(|s| s.id != id);
        if statuses.len() == before {
            return Err(AppError::NotFound(format!("Case run status {}", id)));
        }
        Ok(())
    }
}

#[async_trait]
impl RunStore for InMemoryStore {
    async fn find_run(&self, run_id: i32) -> AppResult<Option<test_run::Model>> {
        Ok(self.run(run_id))
    }

    async fn count_case_runs_by_status(&self, run_id: i32) -> AppResult<Vec<StatusTally>> {
        let mut counts: BTreeMap<i32, u64> = BTreeMap::new();
        for case_run in lock(&self.case_runs).values() {
            if case_run.run_id == run_id {
                *counts.entry(case_run.status_id).or_default() += 1;
            }
        }
        Ok(counts
            .into_iter()
            .map(|(status_id, count)| StatusTally { status_id, count })
            .collect())
    }

    async fn set_run_stop_date(
        &self,
        run_id: i32,
        stop_date: Option<DateTime<Utc>>,
    ) -> AppResult<test_run::Model> {
        let mut runs = lock(&self.runs);
        let run = runs
            .get_mut(&run_id)
            .ok_or_else(|| AppError::NotFound(format!("Test run {}", run_id)))?;
        run.stop_date = stop_date;
        self.stop_date_writes.fetch_add(1, Ordering::SeqCst);
        Ok(run.clone())
    }

    async fn run_recipient_emails(&self, run_id: i32) -> AppResult<Vec<String>> {
        Ok(lock(&self.recipients)
            .get(&run_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn remove_case_run_attachments(&self, case_run_id: i32) -> AppResult<u64> {
        Ok(lock(&self.attachments).remove(&case_run_id).unwrap_or(0))
    }
}

/// Mailer that keeps sent messages in memory.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
    fail: bool,
}

impl RecordingMailer {
    /// A mailer whose every send fails.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<OutgoingMail> {
        lock(&self.sent).clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, mail: &OutgoingMail) -> AppResult<()> {
        if self.fail {
            return Err(AppError::Notification("mail transport unavailable".to_string()));
        }
        lock(&self.sent).push(mail.clone());
        Ok(())
    }
}
