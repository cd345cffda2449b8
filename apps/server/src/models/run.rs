//! Test run domain models, DTOs and list filters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entity::test_run;
use crate::error::{AppError, AppResult};

/// Open/closed state of a run, derived from its stop date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// No stop date.
    Running,
    /// Stop date set.
    Finished,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Finished => "finished",
        }
    }

    /// Case-insensitive parse.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "running" => Some(Self::Running),
            "finished" => Some(Self::Finished),
            _ => None,
        }
    }

    pub fn of(stop_date: Option<DateTime<Utc>>) -> Self {
        if stop_date.is_some() {
            Self::Finished
        } else {
            Self::Running
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What triggered a completion re-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionTrigger {
    /// A case run changed; applies to runs with `auto_update_run_status`.
    Automatic,
    /// An explicit finish/reopen request; applies to runs without it.
    Manual { finish: bool },
}

impl CompletionTrigger {
    pub fn is_automatic(&self) -> bool {
        matches!(self, Self::Automatic)
    }
}

/// Result of a completion re-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CompletionOutcome {
    /// Stop date set.
    Finished { stop_date: DateTime<Utc> },
    /// Stop date cleared.
    Reopened,
    /// Trigger kind did not match the run's policy; nothing changed.
    Ignored,
}

/// Which run people a `people` filter matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeopleRole {
    DefaultTester,
    Manager,
    /// Manager or default tester.
    Either,
}

impl PeopleRole {
    /// Parse the `people_type` parameter; missing or empty means either role.
    pub fn parse(s: Option<&str>) -> Option<Self> {
        match s.map(str::trim).unwrap_or("") {
            "default_tester" => Some(Self::DefaultTester),
            "manager" => Some(Self::Manager),
            "people" | "" => Some(Self::Either),
            _ => None,
        }
    }
}

/// Plan reference in a list query: numeric values are ids, anything else is a name fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanRef {
    Id(i32),
    Name(String),
}

impl PlanRef {
    pub fn parse(value: &str) -> Self {
        match value.trim().parse::<i32>() {
            Ok(id) => Self::Id(id),
            Err(_) => Self::Name(value.trim().to_string()),
        }
    }
}

/// One predicate of a run listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunFilter {
    /// Run id or summary contains the text (case-insensitive).
    Search(String),
    /// Summary contains the text (case-insensitive).
    Summary(String),
    Product(i32),
    ProductVersion(i32),
    Plan(PlanRef),
    Build(i32),
    /// Manager or default tester.
    PeopleId(i32),
    People { user_id: i32, role: PeopleRole },
    Manager(i32),
    DefaultTester(i32),
    /// Run carries at least one of the tags.
    Tags(Vec<String>),
    /// Run has a case run assigned to the user.
    CaseRunAssignee(i32),
    Status(RunStatus),
}

/// Sortable run columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunSortField {
    Id,
    Summary,
    StartDate,
    StopDate,
    Manager,
    DefaultTester,
    Build,
    Plan,
}

/// Ordering of a run listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSort {
    pub field: RunSortField,
    pub descending: bool,
}

impl RunSort {
    /// Parse `field` or `-field`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let (descending, name) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value),
        };

        let field = match name {
            "id" | "run_id" | "pk" => RunSortField::Id,
            "summary" => RunSortField::Summary,
            "start_date" => RunSortField::StartDate,
            "stop_date" => RunSortField::StopDate,
            "manager" => RunSortField::Manager,
            "default_tester" => RunSortField::DefaultTester,
            "build" => RunSortField::Build,
            "plan" => RunSortField::Plan,
            _ => return None,
        };

        Some(Self { field, descending })
    }
}

/// Query parameters for listing runs.
///
/// A parameter only filters when it is present and truthy: empty strings and
/// zero ids are ignored.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct ListRunsQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub product: Option<i32>,
    #[serde(default)]
    pub product_version: Option<i32>,
    /// Plan id, or a fragment of the plan name.
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub build: Option<i32>,
    #[serde(default)]
    pub people_id: Option<i32>,
    /// User id matched according to `people_type`.
    #[serde(default)]
    pub people: Option<i32>,
    /// One of `default_tester`, `manager`, `people` (default).
    #[serde(default)]
    pub people_type: Option<String>,
    #[serde(default)]
    pub manager: Option<i32>,
    #[serde(default)]
    pub default_tester: Option<i32>,
    /// Comma-separated tag names.
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub case_run_assignee: Option<i32>,
    /// `running` or `finished`.
    #[serde(default)]
    pub status: Option<String>,
    /// Column to sort by, prefix with `-` for descending.
    #[serde(default)]
    pub sortby: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i32,
    #[serde(default)]
    pub offset: i32,
}

fn default_limit() -> i32 {
    20
}

fn truthy_str(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn truthy_id(value: Option<i32>) -> Option<i32> {
    value.filter(|id| *id != 0)
}

impl ListRunsQuery {
    /// Build the filter set for this query.
    pub fn filters(&self) -> AppResult<Vec<RunFilter>> {
        let mut filters = Vec::new();

        if let Some(search) = truthy_str(&self.search) {
            filters.push(RunFilter::Search(search.to_string()));
        }
        if let Some(summary) = truthy_str(&self.summary) {
            filters.push(RunFilter::Summary(summary.to_string()));
        }
        if let Some(product) = truthy_id(self.product) {
            filters.push(RunFilter::Product(product));
        }
        if let Some(version) = truthy_id(self.product_version) {
            filters.push(RunFilter::ProductVersion(version));
        }
        if let Some(plan) = truthy_str(&self.plan) {
            filters.push(RunFilter::Plan(PlanRef::parse(plan)));
        }
        if let Some(build) = truthy_id(self.build) {
            filters.push(RunFilter::Build(build));
        }
        if let Some(user_id) = truthy_id(self.people_id) {
            filters.push(RunFilter::PeopleId(user_id));
        }
        if let Some(user_id) = truthy_id(self.people) {
            let role = PeopleRole::parse(self.people_type.as_deref()).ok_or_else(|| {
                AppError::InvalidInput(
                    "people_type must be 'default_tester', 'manager' or 'people'".to_string(),
                )
            })?;
            filters.push(RunFilter::People { user_id, role });
        }
        if let Some(manager) = truthy_id(self.manager) {
            filters.push(RunFilter::Manager(manager));
        }
        if let Some(tester) = truthy_id(self.default_tester) {
            filters.push(RunFilter::DefaultTester(tester));
        }
        if let Some(tags) = truthy_str(&self.tag) {
            let names: Vec<String> = tags
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if !names.is_empty() {
                filters.push(RunFilter::Tags(names));
            }
        }
        if let Some(assignee) = truthy_id(self.case_run_assignee) {
            filters.push(RunFilter::CaseRunAssignee(assignee));
        }
        if let Some(status) = truthy_str(&self.status) {
            let status = RunStatus::parse(status).ok_or_else(|| {
                AppError::InvalidInput("status must be 'running' or 'finished'".to_string())
            })?;
            filters.push(RunFilter::Status(status));
        }

        Ok(filters)
    }

    /// Requested ordering, if any.
    pub fn sort(&self) -> AppResult<Option<RunSort>> {
        match truthy_str(&self.sortby) {
            None => Ok(None),
            Some(value) => RunSort::parse(value)
                .map(Some)
                .ok_or_else(|| AppError::InvalidInput(format!("Cannot sort runs by '{}'", value))),
        }
    }
}

/// Request to create a run.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRunRequest {
    pub summary: String,
    #[serde(default)]
    pub notes: String,
    pub plan_id: i32,
    #[serde(default = "default_text_version")]
    pub plan_text_version: i32,
    pub product_version_id: i32,
    pub build_id: i32,
    pub manager_id: i32,
    #[serde(default)]
    pub default_tester_id: Option<i32>,
    #[serde(default)]
    pub environment_id: i32,
    #[serde(default)]
    pub estimated_time_secs: i64,
    #[serde(default)]
    pub auto_update_run_status: bool,
}

fn default_text_version() -> i32 {
    1
}

impl CreateRunRequest {
    /// Normalize free text before the run is stored.
    pub fn clean(mut self) -> AppResult<Self> {
        self.summary = self.summary.trim().to_string();
        self.notes = self.notes.trim().to_string();

        if self.summary.is_empty() {
            return Err(AppError::InvalidInput("Run summary is required".to_string()));
        }
        if self.estimated_time_secs < 0 {
            return Err(AppError::InvalidInput(
                "estimated_time_secs must not be negative".to_string(),
            ));
        }
        if self.default_tester_id == Some(0) {
            self.default_tester_id = None;
        }

        Ok(self)
    }
}

/// Test run as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TestRunResponse {
    pub id: i32,
    pub summary: String,
    pub notes: String,
    pub plan_id: i32,
    pub plan_text_version: i32,
    pub product_version_id: i32,
    pub build_id: i32,
    pub manager_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_tester_id: Option<i32>,
    pub environment_id: i32,
    /// Estimated duration formatted as `1d2h3m4s`.
    pub estimated_time: String,
    pub auto_update_run_status: bool,
    pub status: RunStatus,
    pub start_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_date: Option<DateTime<Utc>>,
}

impl From<test_run::Model> for TestRunResponse {
    fn from(run: test_run::Model) -> Self {
        Self {
            id: run.id,
            estimated_time: format_duration_secs(run.estimated_time_secs),
            status: RunStatus::of(run.stop_date),
            summary: run.summary,
            notes: run.notes,
            plan_id: run.plan_id,
            plan_text_version: run.plan_text_version,
            product_version_id: run.product_version_id,
            build_id: run.build_id,
            manager_id: run.manager_id,
            default_tester_id: run.default_tester_id,
            environment_id: run.environment_id,
            auto_update_run_status: run.auto_update_run_status,
            start_date: run.start_date,
            stop_date: run.stop_date,
        }
    }
}

/// Format seconds as `1d2h3m4s`, omitting zero parts (`0s` for zero).
pub fn format_duration_secs(total: i64) -> String {
    let total = total.max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;

    let mut out = String::new();
    for (value, unit) in [(days, 'd'), (hours, 'h'), (minutes, 'm'), (seconds, 's')] {
        if value > 0 {
            out.push_str(&format!("{}{}", value, unit));
        }
    }
    if out.is_empty() {
        out.push_str("0s");
    }
    out
}

/// Response for listing runs.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunListResponse {
    pub runs: Vec<TestRunResponse>,
    pub total: i64,
    pub limit: i32,
    pub offset: i32,
}

/// Response after a finish/reopen request.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunCompletionResponse {
    pub run: TestRunResponse,
    #[serde(flatten)]
    pub outcome: CompletionOutcome,
}

/// Request to tag a run.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct TagRequest {
    pub name: String,
}

/// Response listing the tags of a run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunTagsResponse {
    pub run_id: i32,
    pub tags: Vec<String>,
}

/// Response listing the CC recipients of a run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RunCcResponse {
    pub run_id: i32,
    pub user_ids: Vec<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_parse_is_case_insensitive() {
        assert_eq!(RunStatus::parse("Running"), Some(RunStatus::Running));
        assert_eq!(RunStatus::parse("FINISHED"), Some(RunStatus::Finished));
        assert_eq!(RunStatus::parse("paused"), None);
    }

    #[test]
    fn test_empty_query_has_no_filters() {
        let query = ListRunsQuery::default();
        assert!(query.filters().unwrap().is_empty());
        assert!(query.sort().unwrap().is_none());
    }

    #[test]
    fn test_falsy_values_are_skipped() {
        let query = ListRunsQuery {
            search: Some("   ".to_string()),
            summary: Some(String::new()),
            product: Some(0),
            build: Some(0),
            tag: Some(" , ".to_string()),
            status: Some(String::new()),
            ..Default::default()
        };
        assert!(query.filters().unwrap().is_empty());
    }

    #[test]
    fn test_plan_reference_parsing() {
        assert_eq!(PlanRef::parse("42"), PlanRef::Id(42));
        assert_eq!(
            PlanRef::parse("smoke plan"),
            PlanRef::Name("smoke plan".to_string())
        );
    }

    #[test]
    fn test_filters_built_in_order() {
        let query = ListRunsQuery {
            summary: Some("nightly".to_string()),
            plan: Some("7".to_string()),
            tag: Some("smoke, regression".to_string()),
            status: Some("finished".to_string()),
            ..Default::default()
        };

        let filters = query.filters().unwrap();
        assert_eq!(
            filters,
            vec![
                RunFilter::Summary("nightly".to_string()),
                RunFilter::Plan(PlanRef::Id(7)),
                RunFilter::Tags(vec!["smoke".to_string(), "regression".to_string()]),
                RunFilter::Status(RunStatus::Finished),
            ]
        );
    }

    #[test]
    fn test_people_filter_roles() {
        let mut query = ListRunsQuery {
            people: Some(5),
            ..Default::default()
        };
        assert_eq!(
            query.filters().unwrap(),
            vec![RunFilter::People {
                user_id: 5,
                role: PeopleRole::Either
            }]
        );

        query.people_type = Some("manager".to_string());
        assert_eq!(
            query.filters().unwrap(),
            vec![RunFilter::People {
                user_id: 5,
                role: PeopleRole::Manager
            }]
        );

        query.people_type = Some("watcher".to_string());
        assert!(matches!(query.filters(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let query = ListRunsQuery {
            status: Some("paused".to_string()),
            ..Default::default()
        };
        assert!(matches!(query.filters(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!(
            RunSort::parse("-stop_date"),
            Some(RunSort {
                field: RunSortField::StopDate,
                descending: true
            })
        );
        assert_eq!(
            RunSort::parse("summary"),
            Some(RunSort {
                field: RunSortField::Summary,
                descending: false
            })
        );
        assert_eq!(RunSort::parse("password"), None);

        let query = ListRunsQuery {
            sortby: Some("notes; DROP TABLE".to_string()),
            ..Default::default()
        };
        assert!(query.sort().is_err());
    }

    #[test]
    fn test_clean_trims_and_requires_summary() {
        let request = CreateRunRequest {
            summary: "  Nightly regression ".to_string(),
            notes: " \n".to_string(),
            plan_id: 1,
            plan_text_version: 1,
            product_version_id: 1,
            build_id: 1,
            manager_id: 1,
            default_tester_id: Some(0),
            environment_id: 0,
            estimated_time_secs: 0,
            auto_update_run_status: false,
        };

        let cleaned = request.clone().clean().unwrap();
        assert_eq!(cleaned.summary, "Nightly regression");
        assert_eq!(cleaned.notes, "");
        assert_eq!(cleaned.default_tester_id, None);

        let blank = CreateRunRequest {
            summary: "   ".to_string(),
            ..request
        };
        assert!(matches!(blank.clean(), Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_format_duration_secs() {
        assert_eq!(format_duration_secs(0), "0s");
        assert_eq!(format_duration_secs(59), "59s");
        assert_eq!(format_duration_secs(3_600), "1h");
        assert_eq!(format_duration_secs(93_784), "1d2h3m4s");
    }
}
