//! Test run API handlers.

use actix_web::{HttpResponse, web};
use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{
    CompletionTrigger, CreateRunRequest, ListRunsQuery, RunCcResponse, RunCompletionResponse,
    RunEvent, RunListResponse, RunStatsResponse, RunTagsResponse, TagRequest, TestRunResponse,
};
use crate::services::{RunEventBus, RunLifecycle, completed_percentage};

/// Response for the ownership check.
#[derive(Debug, Serialize, ToSchema)]
pub struct RunOwnershipResponse {
    pub run_id: i32,
    pub user_id: i32,
    /// True when the user manages the run or authored its plan.
    pub belongs: bool,
}

/// List runs with filtering, ordering and pagination.
#[utoipa::path(
    get,
    path = "/runs",
    tag = "Runs",
    params(
        ("search" = Option<String>, Query, description = "Run id or summary contains"),
        ("summary" = Option<String>, Query, description = "Summary contains"),
        ("product" = Option<i32>, Query, description = "Product of the run's build"),
        ("product_version" = Option<i32>, Query, description = "Product version id"),
        ("plan" = Option<String>, Query, description = "Plan id, or plan name fragment"),
        ("build" = Option<i32>, Query, description = "Build id"),
        ("people_id" = Option<i32>, Query, description = "Manager or default tester"),
        ("people" = Option<i32>, Query, description = "User matched according to people_type"),
        ("people_type" = Option<String>, Query, description = "default_tester, manager or people"),
        ("manager" = Option<i32>, Query, description = "Manager id"),
        ("default_tester" = Option<i32>, Query, description = "Default tester id"),
        ("tag" = Option<String>, Query, description = "Comma-separated tag names"),
        ("case_run_assignee" = Option<i32>, Query, description = "Runs with a case run assigned to the user"),
        ("status" = Option<String>, Query, description = "running or finished"),
        ("sortby" = Option<String>, Query, description = "Sort column, prefix with - for descending"),
        ("limit" = Option<i32>, Query, description = "Results per page (default 20, max 100)"),
        ("offset" = Option<i32>, Query, description = "Pagination offset")
    ),
    responses(
        (status = 200, description = "List of runs", body = RunListResponse),
        (status = 400, description = "Invalid filter", body = crate::error::ErrorResponse),
    )
)]
pub async fn list_runs(
    pool: web::Data<DbPool>,
    query: web::Query<ListRunsQuery>,
) -> AppResult<HttpResponse> {
    let query = query.into_inner();
    let filters = query.filters()?;
    let sort = query.sort()?;

    let (runs, total) = pool
        .list_runs(&filters, sort, query.limit, query.offset)
        .await?;

    let response = RunListResponse {
        runs: runs.into_iter().map(TestRunResponse::from).collect(),
        total: total as i64,
        limit: query.limit.clamp(1, 100),
        offset: query.offset,
    };

    Ok(HttpResponse::Ok().json(response))
}

/// Create a run.
#[utoipa::path(
    post,
    path = "/runs",
    tag = "Runs",
    request_body = CreateRunRequest,
    responses(
        (status = 201, description = "Run created", body = TestRunResponse),
        (status = 400, description = "Invalid request", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_run(
    pool: web::Data<DbPool>,
    bus: web::Data<RunEventBus>,
    body: web::Json<CreateRunRequest>,
) -> AppResult<HttpResponse> {
    let request = body.into_inner().clean()?;
    let run = pool.insert_run(&request).await?;

    info!(
        run_id = run.id,
        plan_id = run.plan_id,
        auto_update_run_status = run.auto_update_run_status,
        "Test run created"
    );

    bus.publish(RunEvent::RunCreated { run_id: run.id }).await?;

    Ok(HttpResponse::Created().json(TestRunResponse::from(run)))
}

/// Get a run.
#[utoipa::path(
    get,
    path = "/runs/{run_id}",
    tag = "Runs",
    params(("run_id" = i32, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Run details", body = TestRunResponse),
        (status = 404, description = "Run not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_run(pool: web::Data<DbPool>, path: web::Path<i32>) -> AppResult<HttpResponse> {
    let run = pool.require_run(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(TestRunResponse::from(run)))
}

/// Status distribution, bug count and automation split of a run.
#[utoipa::path(
    get,
    path = "/runs/{run_id}/stats",
    tag = "Runs",
    params(("run_id" = i32, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Run statistics", body = RunStatsResponse),
        (status = 404, description = "Run not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_run_stats(
    pool: web::Data<DbPool>,
    lifecycle: web::Data<RunLifecycle>,
    path: web::Path<i32>,
) -> AppResult<HttpResponse> {
    let run_id = path.into_inner();
    let subtotal = lifecycle.subtotal(run_id).await?;
    let bug_count = pool.count_run_bugs(run_id).await?;
    let automation = pool.count_run_automation(run_id).await?;

    let response = RunStatsResponse {
        run_id,
        completed_percentage: completed_percentage(&subtotal),
        subtotal,
        bug_count,
        automation,
    };

    Ok(HttpResponse::Ok().json(response))
}

async fn complete_run(
    lifecycle: &RunLifecycle,
    run_id: i32,
    finish: bool,
) -> AppResult<HttpResponse> {
    let outcome = lifecycle
        .update_completion_status(run_id, CompletionTrigger::Manual { finish })
        .await?;
    let run = lifecycle.run(run_id).await?;

    Ok(HttpResponse::Ok().json(RunCompletionResponse {
        run: TestRunResponse::from(run),
        outcome,
    }))
}

/// Finish a manually managed run.
///
/// Runs with `auto_update_run_status` ignore the request (`outcome: ignored`).
#[utoipa::path(
    post,
    path = "/runs/{run_id}/finish",
    tag = "Runs",
    params(("run_id" = i32, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Completion outcome", body = RunCompletionResponse),
        (status = 404, description = "Run not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn finish_run(
    lifecycle: web::Data<RunLifecycle>,
    path: web::Path<i32>,
) -> AppResult<HttpResponse> {
    complete_run(&lifecycle, path.into_inner(), true).await
}

/// Reopen a manually managed run.
#[utoipa::path(
    post,
    path = "/runs/{run_id}/reopen",
    tag = "Runs",
    params(("run_id" = i32, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Completion outcome", body = RunCompletionResponse),
        (status = 404, description = "Run not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn reopen_run(
    lifecycle: web::Data<RunLifecycle>,
    path: web::Path<i32>,
) -> AppResult<HttpResponse> {
    complete_run(&lifecycle, path.into_inner(), false).await
}

/// Whether a user manages a run or authored its plan.
#[utoipa::path(
    get,
    path = "/runs/{run_id}/belongs_to/{user_id}",
    tag = "Runs",
    params(
        ("run_id" = i32, Path, description = "Run ID"),
        ("user_id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "Ownership", body = RunOwnershipResponse),
        (status = 404, description = "Run not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn run_belongs_to(
    pool: web::Data<DbPool>,
    path: web::Path<(i32, i32)>,
) -> AppResult<HttpResponse> {
    let (run_id, user_id) = path.into_inner();
    let belongs = pool.run_belongs_to(run_id, user_id).await?;

    Ok(HttpResponse::Ok().json(RunOwnershipResponse {
        run_id,
        user_id,
        belongs,
    }))
}

/// List the tags of a run.
#[utoipa::path(
    get,
    path = "/runs/{run_id}/tags",
    tag = "Runs",
    params(("run_id" = i32, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Run tags", body = RunTagsResponse),
        (status = 404, description = "Run not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn list_run_tags(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> AppResult<HttpResponse> {
    let run_id = path.into_inner();
    pool.require_run(run_id).await?;
    let tags = pool.list_run_tags(run_id).await?;

    Ok(HttpResponse::Ok().json(RunTagsResponse { run_id, tags }))
}

/// Tag a run.
#[utoipa::path(
    post,
    path = "/runs/{run_id}/tags",
    tag = "Runs",
    params(("run_id" = i32, Path, description = "Run ID")),
    request_body = TagRequest,
    responses(
        (status = 200, description = "Run tags", body = RunTagsResponse),
        (status = 400, description = "Invalid tag", body = crate::error::ErrorResponse),
        (status = 404, description = "Run not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn add_run_tag(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
    body: web::Json<TagRequest>,
) -> AppResult<HttpResponse> {
    let run_id = path.into_inner();
    let name = body.name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("Tag name must not be empty".to_string()));
    }

    let run = pool.require_run(run_id).await?;
    pool.add_run_tag(run_id, name, run.manager_id).await?;
    let tags = pool.list_run_tags(run_id).await?;

    Ok(HttpResponse::Ok().json(RunTagsResponse { run_id, tags }))
}

/// Remove a tag from a run.
#[utoipa::path(
    delete,
    path = "/runs/{run_id}/tags/{name}",
    tag = "Runs",
    params(
        ("run_id" = i32, Path, description = "Run ID"),
        ("name" = String, Path, description = "Tag name")
    ),
    responses(
        (status = 200, description = "Run tags", body = RunTagsResponse),
        (status = 404, description = "Run not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn remove_run_tag(
    pool: web::Data<DbPool>,
    path: web::Path<(i32, String)>,
) -> AppResult<HttpResponse> {
    let (run_id, name) = path.into_inner();
    pool.require_run(run_id).await?;
    pool.remove_run_tag(run_id, name.trim()).await?;
    let tags = pool.list_run_tags(run_id).await?;

    Ok(HttpResponse::Ok().json(RunTagsResponse { run_id, tags }))
}

/// List the CC recipients of a run.
#[utoipa::path(
    get,
    path = "/runs/{run_id}/cc",
    tag = "Runs",
    params(("run_id" = i32, Path, description = "Run ID")),
    responses(
        (status = 200, description = "CC recipients", body = RunCcResponse),
        (status = 404, description = "Run not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn list_run_cc(
    pool: web::Data<DbPool>,
    path: web::Path<i32>,
) -> AppResult<HttpResponse> {
    let run_id = path.into_inner();
    pool.require_run(run_id).await?;
    let user_ids = pool.list_run_cc(run_id).await?;

    Ok(HttpResponse::Ok().json(RunCcResponse { run_id, user_ids }))
}

/// Add a user to the CC list of a run.
#[utoipa::path(
    put,
    path = "/runs/{run_id}/cc/{user_id}",
    tag = "Runs",
    params(
        ("run_id" = i32, Path, description = "Run ID"),
        ("user_id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "CC recipients", body = RunCcResponse),
        (status = 404, description = "Run or user not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn add_run_cc(
    pool: web::Data<DbPool>,
    path: web::Path<(i32, i32)>,
) -> AppResult<HttpResponse> {
    let (run_id, user_id) = path.into_inner();
    pool.require_run(run_id).await?;
    pool.add_run_cc(run_id, user_id).await?;
    let user_ids = pool.list_run_cc(run_id).await?;

    Ok(HttpResponse::Ok().json(RunCcResponse { run_id, user_ids }))
}

/// Remove a user from the CC list of a run.
#[utoipa::path(
    delete,
    path = "/runs/{run_id}/cc/{user_id}",
    tag = "Runs",
    params(
        ("run_id" = i32, Path, description = "Run ID"),
        ("user_id" = i32, Path, description = "User ID")
    ),
    responses(
        (status = 200, description = "CC recipients", body = RunCcResponse),
        (status = 404, description = "Run not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn remove_run_cc(
    pool: web::Data<DbPool>,
    path: web::Path<(i32, i32)>,
) -> AppResult<HttpResponse> {
    let (run_id, user_id) = path.into_inner();
    pool.require_run(run_id).await?;
    pool.remove_run_cc(run_id, user_id).await?;
    let user_ids = pool.list_run_cc(run_id).await?;

    Ok(HttpResponse::Ok().json(RunCcResponse { run_id, user_ids }))
}

/// Routes that only need the run services (no direct database access).
pub fn configure_completion_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/runs/{run_id}/finish").route(web::post().to(finish_run)))
        .service(web::resource("/runs/{run_id}/reopen").route(web::post().to(reopen_run)));
}

/// Configure run routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/runs")
            .route(web::get().to(list_runs))
            .route(web::post().to(create_run)),
    )
    .service(web::resource("/runs/{run_id}").route(web::get().to(get_run)))
    .service(web::resource("/runs/{run_id}/stats").route(web::get().to(get_run_stats)))
    .service(
        web::resource("/runs/{run_id}/belongs_to/{user_id}").route(web::get().to(run_belongs_to)),
    )
    .service(
        web::resource("/runs/{run_id}/tags")
            .route(web::get().to(list_run_tags))
            .route(web::post().to(add_run_tag)),
    )
    .service(web::resource("/runs/{run_id}/tags/{name}").route(web::delete().to(remove_run_tag)))
    .service(web::resource("/runs/{run_id}/cc").route(web::get().to(list_run_cc)))
    .service(
        web::resource("/runs/{run_id}/cc/{user_id}")
            .route(web::put().to(add_run_cc))
            .route(web::delete().to(remove_run_cc)),
    )
    .configure(configure_completion_routes);
}
