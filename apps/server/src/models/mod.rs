//! Domain models for the test run tracker.

pub mod case_run;
pub mod run;
pub mod run_event;
pub mod stats;
pub mod status;

// Re-export commonly used types
pub use case_run::{
    AddCaseRunRequest, CaseRunListResponse, CaseRunResponse, NewCaseRun, StatusRef,
    UpdateAssigneeRequest, UpdateCaseRunStatusRequest, resolve_assignee,
    resolve_case_text_version,
};
pub use run::{
    CompletionOutcome, CompletionTrigger, CreateRunRequest, ListRunsQuery, PeopleRole, PlanRef,
    RunCcResponse, RunCompletionResponse, RunFilter, RunListResponse, RunSort, RunSortField,
    RunStatus, RunTagsResponse, TagRequest, TestRunResponse,
};
pub use run_event::RunEvent;
pub use stats::{AutomationCounts, RunStatsResponse, StatusCount, StatusSubtotal, StatusTally};
pub use status::{NewStatus, RenameStatusRequest, StatusDefinition, StatusListResponse};
