//! Case run (run item) DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entity::test_case_run;
use crate::error::{AppError, AppResult};

use super::status::StatusDefinition;

/// Status given either by catalog id or by (case-insensitive) name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusRef {
    Id(i32),
    Name(String),
}

impl StatusRef {
    /// Pick the reference from an id/name pair; the id wins when both are given.
    pub fn from_parts(status_id: Option<i32>, status: Option<&str>) -> Option<Self> {
        match (status_id, status.map(str::trim).filter(|s| !s.is_empty())) {
            (Some(id), _) => Some(Self::Id(id)),
            (None, Some(name)) => Some(Self::Name(name.to_string())),
            (None, None) => None,
        }
    }
}

/// Request to attach a test case to a run.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddCaseRunRequest {
    pub case_id: i32,
    /// Falls back to the case's default tester, then the run's default tester.
    #[serde(default)]
    pub assignee_id: Option<i32>,
    /// Initial status id (defaults to IDLE).
    #[serde(default)]
    pub status_id: Option<i32>,
    /// Initial status name (defaults to IDLE).
    #[serde(default)]
    pub status: Option<String>,
    /// Defaults to the case's latest text version.
    #[serde(default)]
    pub case_text_version: Option<i32>,
    /// Defaults to the run's build.
    #[serde(default)]
    pub build_id: Option<i32>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub sortkey: i32,
}

impl AddCaseRunRequest {
    pub fn status_ref(&self) -> Option<StatusRef> {
        StatusRef::from_parts(self.status_id, self.status.as_deref())
    }
}

/// Request to record a new outcome for a case run.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateCaseRunStatusRequest {
    #[serde(default)]
    pub status_id: Option<i32>,
    #[serde(default)]
    pub status: Option<String>,
    /// User recording the outcome.
    #[serde(default)]
    pub tested_by_id: Option<i32>,
}

impl UpdateCaseRunStatusRequest {
    pub fn status_ref(&self) -> AppResult<StatusRef> {
        StatusRef::from_parts(self.status_id, self.status.as_deref()).ok_or_else(|| {
            AppError::InvalidInput("Either status_id or status is required".to_string())
        })
    }
}

/// Request to change the assignee of a case run.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpdateAssigneeRequest {
    pub assignee_id: i32,
}

/// Case run as returned by the API.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CaseRunResponse {
    pub id: i32,
    pub run_id: i32,
    pub case_id: i32,
    pub status_id: i32,
    /// Status name, when the status is in the catalog.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub is_finished: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignee_id: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tested_by_id: Option<i32>,
    pub case_text_version: i32,
    pub build_id: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sortkey: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub running_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub close_date: Option<DateTime<Utc>>,
}

impl CaseRunResponse {
    pub fn new(model: test_case_run::Model, status: Option<&StatusDefinition>) -> Self {
        Self {
            id: model.id,
            run_id: model.run_id,
            case_id: model.case_id,
            status_id: model.status_id,
            status: status.map(|s| s.name.clone()),
            is_finished: status.is_some_and(StatusDefinition::is_complete),
            assignee_id: model.assignee_id,
            tested_by_id: model.tested_by_id,
            case_text_version: model.case_text_version,
            build_id: model.build_id,
            sortkey: model.sortkey,
            notes: model.notes,
            running_date: model.running_date,
            close_date: model.close_date,
        }
    }
}

/// Response listing the case runs of a run.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CaseRunListResponse {
    pub run_id: i32,
    pub case_runs: Vec<CaseRunResponse>,
}

/// Values for inserting a case run, after defaults were resolved.
#[derive(Debug, Clone)]
pub struct NewCaseRun {
    pub run_id: i32,
    pub case_id: i32,
    pub status_id: i32,
    pub assignee_id: Option<i32>,
    pub case_text_version: i32,
    pub build_id: i32,
    pub environment_id: i32,
    pub notes: Option<String>,
    pub sortkey: i32,
}

/// Pick a case run assignee: explicit, else the case's default tester, else the run's.
pub fn resolve_assignee(
    explicit: Option<i32>,
    case_default_tester: Option<i32>,
    run_default_tester: Option<i32>,
) -> Option<i32> {
    explicit
        .filter(|id| *id != 0)
        .or(case_default_tester)
        .or(run_default_tester)
}

/// Pick the case text version a new case run pins: the requested one, else the
/// case's latest, else 0 for a case without text.
pub fn resolve_case_text_version(requested: Option<i32>, latest: Option<i32>) -> i32 {
    requested.filter(|v| *v > 0).or(latest).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_ref_prefers_id() {
        assert_eq!(
            StatusRef::from_parts(Some(3), Some("passed")),
            Some(StatusRef::Id(3))
        );
        assert_eq!(
            StatusRef::from_parts(None, Some(" passed ")),
            Some(StatusRef::Name("passed".to_string()))
        );
        assert_eq!(StatusRef::from_parts(None, Some("  ")), None);
    }

    #[test]
    fn test_update_request_requires_status() {
        let request = UpdateCaseRunStatusRequest {
            status_id: None,
            status: None,
            tested_by_id: Some(1),
        };
        assert!(matches!(
            request.status_ref(),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_resolve_assignee_fallback_chain() {
        assert_eq!(resolve_assignee(Some(4), Some(5), Some(6)), Some(4));
        assert_eq!(resolve_assignee(None, Some(5), Some(6)), Some(5));
        assert_eq!(resolve_assignee(Some(0), None, Some(6)), Some(6));
        assert_eq!(resolve_assignee(None, None, None), None);
    }

    #[test]
    fn test_case_text_version_defaults_to_latest() {
        assert_eq!(resolve_case_text_version(Some(2), Some(5)), 2);
        assert_eq!(resolve_case_text_version(None, Some(5)), 5);
        assert_eq!(resolve_case_text_version(Some(0), Some(5)), 5);
        assert_eq!(resolve_case_text_version(None, None), 0);
    }
}
