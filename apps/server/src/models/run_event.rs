//! Run change events delivered to the run event bus.

use serde::Serialize;

/// A persisted change to a run or one of its case runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A run was created.
    RunCreated { run_id: i32 },
    /// A case run was inserted or updated.
    CaseRunSaved {
        run_id: i32,
        case_run_id: i32,
        created: bool,
        status_changed: bool,
    },
    /// A case run was removed from its run.
    CaseRunDeleted { run_id: i32, case_run_id: i32 },
    /// Case runs of one run got a new assignee.
    CaseRunAssigneeChanged { run_id: i32, case_run_ids: Vec<i32> },
}

impl RunEvent {
    pub fn run_id(&self) -> i32 {
        match self {
            Self::RunCreated { run_id }
            | Self::CaseRunSaved { run_id, .. }
            | Self::CaseRunDeleted { run_id, .. }
            | Self::CaseRunAssigneeChanged { run_id, .. } => *run_id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::RunCreated { .. } => "run_created",
            Self::CaseRunSaved { .. } => "case_run_saved",
            Self::CaseRunDeleted { .. } => "case_run_deleted",
            Self::CaseRunAssigneeChanged { .. } => "case_run_assignee_changed",
        }
    }
}
