//! Business logic services.

pub mod notification;
pub mod run_events;
pub mod run_lifecycle;
pub mod run_stats;
pub mod status_catalog;
pub mod store;

pub use notification::{LogMailer, MailRenderer, MailTemplate, Mailer, OutgoingMail, RunNotifier};
pub use run_events::{
    CompletionHandler, HousekeepingHandler, NotificationHandler, RunEventBus, RunEventHandler,
};
pub use run_lifecycle::RunLifecycle;
pub use run_stats::{completed_percentage, compute_subtotal, percentage_of};
pub use status_catalog::{StatusCache, StatusCatalog};
pub use store::{RunStore, StatusStore};
