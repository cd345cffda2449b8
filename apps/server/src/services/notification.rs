//! Run notification mail.
//!
//! Recipients are the run manager, the CC list, the default tester and every
//! case run assignee, deduplicated by address. Bodies are rendered from the
//! templates under `templates/`; delivery goes through a [`Mailer`].

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::NotificationConfig;
use crate::entity::test_run;
use crate::error::{AppError, AppResult};
use crate::models::run::format_duration_secs;

use super::store::RunStore;

const NEW_RUN_TEMPLATE: &str = include_str!("templates/new_run.txt");
const ASSIGNEE_CHANGED_TEMPLATE: &str = include_str!("templates/case_run_assignee_changed.txt");

/// Available notification bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailTemplate {
    NewRun,
    CaseRunAssigneeChanged,
}

impl MailTemplate {
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewRun => "new_run",
            Self::CaseRunAssigneeChanged => "case_run_assignee_changed",
        }
    }

    pub fn subject(&self, run: &test_run::Model) -> String {
        match self {
            Self::NewRun => format!("New test run {} created: {}", run.id, run.summary),
            Self::CaseRunAssigneeChanged => {
                format!("Assignee of run {} has been changed", run.id)
            }
        }
    }
}

/// A rendered message ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Delivers rendered messages.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> AppResult<()>;
}

/// Mailer that writes messages to the log instead of sending them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: &OutgoingMail) -> AppResult<()> {
        info!(
            from = %mail.from,
            to = %mail.to.join(", "),
            subject = %mail.subject,
            "Outgoing notification"
        );
        debug!(body = %mail.body, "Notification body");
        Ok(())
    }
}

/// Trim, drop empty addresses and remove duplicates. Output is sorted.
pub fn dedupe_recipients<I, S>(addresses: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    addresses
        .into_iter()
        .map(|a| a.as_ref().trim().to_string())
        .filter(|a| !a.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Serialize)]
struct RunContext<'a> {
    id: i32,
    summary: &'a str,
    notes: &'a str,
    plan_id: i32,
    build_id: i32,
    manager_id: i32,
    start_date: String,
    estimated_time: Option<String>,
}

impl<'a> From<&'a test_run::Model> for RunContext<'a> {
    fn from(run: &'a test_run::Model) -> Self {
        Self {
            id: run.id,
            summary: &run.summary,
            notes: run.notes.trim(),
            plan_id: run.plan_id,
            build_id: run.build_id,
            manager_id: run.manager_id,
            start_date: run.start_date.format("%Y-%m-%d %H:%M").to_string(),
            estimated_time: (run.estimated_time_secs > 0)
                .then(|| format_duration_secs(run.estimated_time_secs)),
        }
    }
}

/// Template engine wrapper for notification bodies.
pub struct MailRenderer {
    env: Environment<'static>,
}

impl MailRenderer {
    pub fn new() -> AppResult<Self> {
        let mut env = Environment::new();
        env.add_template(MailTemplate::NewRun.name(), NEW_RUN_TEMPLATE)?;
        env.add_template(
            MailTemplate::CaseRunAssigneeChanged.name(),
            ASSIGNEE_CHANGED_TEMPLATE,
        )?;
        Ok(Self { env })
    }

    pub fn render(
        &self,
        template: MailTemplate,
        run: &test_run::Model,
        case_run_ids: &[i32],
        run_url: &str,
    ) -> AppResult<String> {
        let tmpl = self.env.get_template(template.name())?;
        let rendered = tmpl.render(context! {
            run => RunContext::from(run),
            case_run_ids => case_run_ids,
            run_url => run_url,
        })?;
        Ok(rendered)
    }
}

/// Builds and dispatches run notifications.
pub struct RunNotifier {
    runs: Arc<dyn RunStore>,
    mailer: Arc<dyn Mailer>,
    renderer: MailRenderer,
    config: NotificationConfig,
}

impl RunNotifier {
    pub fn new(
        runs: Arc<dyn RunStore>,
        mailer: Arc<dyn Mailer>,
        config: NotificationConfig,
    ) -> AppResult<Self> {
        Ok(Self {
            runs,
            mailer,
            renderer: MailRenderer::new()?,
            config,
        })
    }

    fn run_url(&self, run_id: i32) -> String {
        format!("{}/runs/{}/", self.config.base_url.trim_end_matches('/'), run_id)
    }

    /// Render and send `template` for a run. Returns the message that was sent,
    /// or `None` when mail is disabled or the run has no recipients.
    pub async fn notify(
        &self,
        run_id: i32,
        template: MailTemplate,
        case_run_ids: &[i32],
    ) -> AppResult<Option<OutgoingMail>> {
        if !self.config.enabled {
            debug!(run_id, template = template.name(), "Mail disabled, skipping notification");
            return Ok(None);
        }

        let run = self
            .runs
            .find_run(run_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Test run {}", run_id)))?;

        let to = dedupe_recipients(self.runs.run_recipient_emails(run_id).await?);
        if to.is_empty() {
            debug!(run_id, template = template.name(), "No recipients, skipping notification");
            return Ok(None);
        }

        let body = self
            .renderer
            .render(template, &run, case_run_ids, &self.run_url(run_id))?;
        let mail = OutgoingMail {
            from: self.config.from_address.clone(),
            to,
            subject: template.subject(&run),
            body,
        };

        self.mailer.send(&mail).await?;
        Ok(Some(mail))
    }
}
