//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Test Run Tracker",
        version = "0.1.0",
        description = "Test runs, case run outcomes, status subtotals and run completion"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    ),
    paths(
        // Health endpoints
        api::health::health,
        api::health::ready,
        // Run endpoints
        api::test_runs::list_runs,
        api::test_runs::create_run,
        api::test_runs::get_run,
        api::test_runs::get_run_stats,
        api::test_runs::finish_run,
        api::test_runs::reopen_run,
        api::test_runs::run_belongs_to,
        api::test_runs::list_run_tags,
        api::test_runs::add_run_tag,
        api::test_runs::remove_run_tag,
        api::test_runs::list_run_cc,
        api::test_runs::add_run_cc,
        api::test_runs::remove_run_cc,
        // Case run endpoints
        api::case_runs::list_case_runs,
        api::case_runs::add_case_run,
        api::case_runs::update_case_run_status,
        api::case_runs::update_case_run_assignee,
        api::case_runs::delete_case_run,
        // Status catalog endpoints
        api::statuses::list_statuses,
        api::statuses::get_status,
        api::statuses::create_status,
        api::statuses::rename_status,
        api::statuses::delete_status,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // Runs
            models::RunStatus,
            models::CompletionOutcome,
            models::CreateRunRequest,
            models::TestRunResponse,
            models::RunListResponse,
            models::RunCompletionResponse,
            models::TagRequest,
            models::RunTagsResponse,
            models::RunCcResponse,
            api::test_runs::RunOwnershipResponse,
            // Statistics
            models::StatusCount,
            models::StatusSubtotal,
            models::AutomationCounts,
            models::RunStatsResponse,
            // Case runs
            models::AddCaseRunRequest,
            models::UpdateCaseRunStatusRequest,
            models::UpdateAssigneeRequest,
            models::CaseRunResponse,
            models::CaseRunListResponse,
            // Status catalog
            models::StatusDefinition,
            models::NewStatus,
            models::RenameStatusRequest,
            models::StatusListResponse,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Runs", description = "Test runs, completion, tags and CC lists"),
        (name = "Case Runs", description = "Case runs within a test run"),
        (name = "Statuses", description = "Case run status catalog")
    )
)]
pub struct ApiDoc;
