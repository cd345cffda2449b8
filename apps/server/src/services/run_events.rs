//! Run event bus.
//!
//! Handlers are subscribed once at start-up and invoked sequentially, in
//! subscription order, for every published event. Publishing happens after the
//! change was persisted. A handler error stops delivery and is returned to the
//! publisher; the persisted change is not rolled back.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::AppResult;
use crate::models::{CompletionTrigger, RunEvent};

use super::notification::{MailTemplate, RunNotifier};
use super::run_lifecycle::RunLifecycle;
use super::store::RunStore;

/// Reaction to run events.
#[async_trait]
pub trait RunEventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &RunEvent) -> AppResult<()>;
}

/// Ordered list of run event subscribers.
#[derive(Clone, Default)]
pub struct RunEventBus {
    handlers: Vec<Arc<dyn RunEventHandler>>,
}

impl RunEventBus {
    /// A bus without subscribers; publishing is a no-op.
    pub fn new() -> Self {
        Self::default()
    }

    /// The production wiring: housekeeping, then run completion, then mail.
    pub fn standard(
        runs: Arc<dyn RunStore>,
        lifecycle: Arc<RunLifecycle>,
        notifier: Arc<RunNotifier>,
    ) -> Self {
        let mut bus = Self::new();
        bus.subscribe(Arc::new(HousekeepingHandler::new(runs)));
        bus.subscribe(Arc::new(CompletionHandler::new(lifecycle)));
        bus.subscribe(Arc::new(NotificationHandler::new(notifier)));
        bus
    }

    pub fn subscribe(&mut self, handler: Arc<dyn RunEventHandler>) {
        debug!(handler = handler.name(), "Run event handler subscribed");
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Deliver an event to every handler in order.
    /// Returns the number of handlers invoked.
    pub async fn publish(&self, event: RunEvent) -> AppResult<usize> {
        debug!(
            kind = event.kind(),
            run_id = event.run_id(),
            handlers = self.handlers.len(),
            "Publishing run event"
        );

        for handler in &self.handlers {
            handler.handle(&event).await?;
        }
        Ok(self.handlers.len())
    }
}

/// Re-evaluates run completion when a case run is created, changes status or
/// is removed.
pub struct CompletionHandler {
    lifecycle: Arc<RunLifecycle>,
}

impl CompletionHandler {
    pub fn new(lifecycle: Arc<RunLifecycle>) -> Self {
        Self { lifecycle }
    }
}

#[async_trait]
impl RunEventHandler for CompletionHandler {
    fn name(&self) -> &'static str {
        "completion"
    }

    async fn handle(&self, event: &RunEvent) -> AppResult<()> {
        let applies = match event {
            RunEvent::CaseRunSaved {
                created,
                status_changed,
                ..
            } => *created || *status_changed,
            RunEvent::CaseRunDeleted { .. } => true,
            _ => false,
        };

        if applies {
            self.lifecycle
                .update_completion_status(event.run_id(), CompletionTrigger::Automatic)
                .await?;
        }
        Ok(())
    }
}

/// Removes link references and bug associations of deleted case runs.
pub struct HousekeepingHandler {
    runs: Arc<dyn RunStore>,
}

impl HousekeepingHandler {
    pub fn new(runs: Arc<dyn RunStore>) -> Self {
        Self { runs }
    }
}

#[async_trait]
impl RunEventHandler for HousekeepingHandler {
    fn name(&self) -> &'static str {
        "housekeeping"
    }

    async fn handle(&self, event: &RunEvent) -> AppResult<()> {
        if let RunEvent::CaseRunDeleted { case_run_id, .. } = event {
            let removed = self.runs.remove_case_run_attachments(*case_run_id).await?;
            debug!(case_run_id, removed, "Case run attachments removed");
        }
        Ok(())
    }
}

/// Sends new-run and assignee-changed mail.
///
/// Mail failures are logged and swallowed so they never fail the change that
/// triggered them.
pub struct NotificationHandler {
    notifier: Arc<RunNotifier>,
}

impl NotificationHandler {
    pub fn new(notifier: Arc<RunNotifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl RunEventHandler for NotificationHandler {
    fn name(&self) -> &'static str {
        "notification"
    }

    async fn handle(&self, event: &RunEvent) -> AppResult<()> {
        let (template, case_run_ids): (MailTemplate, &[i32]) = match event {
            RunEvent::RunCreated { .. } => (MailTemplate::NewRun, &[][..]),
            RunEvent::CaseRunAssigneeChanged { case_run_ids, .. } => {
                (MailTemplate::CaseRunAssigneeChanged, case_run_ids.as_slice())
            }
            _ => return Ok(()),
        };

        if let Err(e) = self
            .notifier
            .notify(event.run_id(), template, case_run_ids)
            .await
        {
            warn!(
                run_id = event.run_id(),
                template = template.name(),
                error = %e,
                "Failed to send run notification"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::config::NotificationConfig;
    use crate::services::status_catalog::{StatusCache, StatusCatalog};
    use crate::test_support::{InMemoryStore, RecordingMailer};

    const IDLE: i32 = 1;
    const PASSED: i32 = 2;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl RunEventHandler for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn handle(&self, event: &RunEvent) -> AppResult<()> {
            self.log
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, event.kind()));
            Ok(())
        }
    }

    fn standard_bus(store: &Arc<InMemoryStore>, mailer: &Arc<RecordingMailer>) -> RunEventBus {
        let catalog = Arc::new(StatusCatalog::new(store.clone(), StatusCache::default()));
        let lifecycle = Arc::new(RunLifecycle::new(store.clone(), catalog));
        let notifier = Arc::new(
            RunNotifier::new(
                store.clone(),
                mailer.clone(),
                NotificationConfig {
                    enabled: true,
                    from_address: "tcms@example.com".to_string(),
                    base_url: "https://tcms.example.com".to_string(),
                },
            )
            .unwrap(),
        );
        RunEventBus::standard(store.clone(), lifecycle, notifier)
    }

    #[tokio::test]
    async fn test_handlers_run_in_subscription_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut bus = RunEventBus::new();
        for name in ["first", "second", "third"] {
            bus.subscribe(Arc::new(Recorder {
                name,
                log: log.clone(),
            }));
        }

        let invoked = bus.publish(RunEvent::RunCreated { run_id: 1 }).await.unwrap();
        assert_eq!(invoked, 3);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "first:run_created",
                "second:run_created",
                "third:run_created"
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_bus_publishes_nothing() {
        let bus = RunEventBus::new();
        assert!(bus.is_empty());
        assert_eq!(
            bus.publish(RunEvent::RunCreated { run_id: 1 }).await.unwrap(),
            0
        );
    }

    #[tokio::test]
    async fn test_status_change_closes_automatic_run() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let mailer = Arc::new(RecordingMailer::default());
        let bus = standard_bus(&store, &mailer);
        assert_eq!(bus.len(), 3);

        let run_id = store.insert_run(true);
        let case_run_id = store.add_case_run(run_id, IDLE);
        store.set_case_run_status(case_run_id, PASSED);

        bus.publish(RunEvent::CaseRunSaved {
            run_id,
            case_run_id,
            created: false,
            status_changed: true,
        })
        .await
        .unwrap();
        assert!(store.run(run_id).unwrap().stop_date.is_some());
    }

    #[tokio::test]
    async fn test_save_without_status_change_leaves_run() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let mailer = Arc::new(RecordingMailer::default());
        let bus = standard_bus(&store, &mailer);

        let run_id = store.insert_run(true);
        let case_run_id = store.add_case_run(run_id, PASSED);

        bus.publish(RunEvent::CaseRunSaved {
            run_id,
            case_run_id,
            created: false,
            status_changed: false,
        })
        .await
        .unwrap();
        assert!(store.run(run_id).unwrap().stop_date.is_none());
        assert_eq!(store.stop_date_writes(), 0);
    }

    #[tokio::test]
    async fn test_delete_cleans_attachments_and_recomputes() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let mailer = Arc::new(RecordingMailer::default());
        let bus = standard_bus(&store, &mailer);

        let run_id = store.insert_run(true);
        store.add_case_run(run_id, PASSED);
        let idle = store.add_case_run(run_id, IDLE);
        store.set_attachments(idle, 3);

        store.remove_case_run(idle);
        bus.publish(RunEvent::CaseRunDeleted {
            run_id,
            case_run_id: idle,
        })
        .await
        .unwrap();

        assert_eq!(store.attachments(idle), 0);
        // The remaining case run is complete
        assert!(store.run(run_id).unwrap().stop_date.is_some());
    }

    #[tokio::test]
    async fn test_mail_events_reach_mailer() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let mailer = Arc::new(RecordingMailer::default());
        let bus = standard_bus(&store, &mailer);

        let run_id = store.insert_run(false);
        store.set_recipients(run_id, vec!["manager@example.com"]);

        bus.publish(RunEvent::RunCreated { run_id }).await.unwrap();
        bus.publish(RunEvent::CaseRunAssigneeChanged {
            run_id,
            case_run_ids: vec![7],
        })
        .await
        .unwrap();

        let sent = mailer.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].subject.starts_with("New test run"));
        assert!(sent[1].subject.starts_with("Assignee of run"));
    }

    #[tokio::test]
    async fn test_mail_failure_does_not_fail_publish() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let mailer = Arc::new(RecordingMailer::failing());
        let bus = standard_bus(&store, &mailer);

        let run_id = store.insert_run(false);
        store.set_recipients(run_id, vec!["manager@example.com"]);

        assert!(bus.publish(RunEvent::RunCreated { run_id }).await.is_ok());
        assert!(mailer.sent().is_empty());
    }
}
