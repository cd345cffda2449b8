//! Case run API handlers.
//!
//! Every write publishes a run event after it is persisted so run completion,
//! housekeeping and notification handlers see the new state.

use actix_web::{HttpResponse, web};
use tracing::info;

use crate::db::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::{
    AddCaseRunRequest, CaseRunListResponse, CaseRunResponse, NewCaseRun, RunEvent,
    UpdateAssigneeRequest, UpdateCaseRunStatusRequest, resolve_assignee,
    resolve_case_text_version,
};
use crate::services::{RunEventBus, StatusCatalog};

/// List the case runs of a run.
#[utoipa::path(
    get,
    path = "/runs/{run_id}/case_runs",
    tag = "Case Runs",
    params(("run_id" = i32, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Case runs of the run", body = CaseRunListResponse),
        (status = 404, description = "Run not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn list_case_runs(
    pool: web::Data<DbPool>,
    catalog: web::Data<StatusCatalog>,
    path: web::Path<i32>,
) -> AppResult<HttpResponse> {
    let run_id = path.into_inner();
    pool.require_run(run_id).await?;

    let statuses = catalog.all().await?;
    let case_runs = pool
        .list_case_runs(run_id)
        .await?
        .into_iter()
        .map(|cr| {
            let status = statuses.iter().find(|s| s.id == cr.status_id);
            CaseRunResponse::new(cr, status)
        })
        .collect();

    Ok(HttpResponse::Ok().json(CaseRunListResponse { run_id, case_runs }))
}

/// Attach a test case to a run.
///
/// The assignee defaults to the case's default tester, then the run's; the
/// status defaults to IDLE and the build to the run's build.
#[utoipa::path(
    post,
    path = "/runs/{run_id}/case_runs",
    tag = "Case Runs",
    params(("run_id" = i32, Path, description = "Run ID")),
    request_body = AddCaseRunRequest,
    responses(
        (status = 201, description = "Case run created", body = CaseRunResponse),
        (status = 404, description = "Run, case or status not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn add_case_run(
    pool: web::Data<DbPool>,
    catalog: web::Data<StatusCatalog>,
    bus: web::Data<RunEventBus>,
    path: web::Path<i32>,
    body: web::Json<AddCaseRunRequest>,
) -> AppResult<HttpResponse> {
    let run_id = path.into_inner();
    let request = body.into_inner();

    let run = pool.require_run(run_id).await?;
    let case = pool
        .get_test_case(request.case_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Test case {}", request.case_id)))?;

    let status = match request.status_ref() {
        Some(status) => catalog.resolve(&status).await?,
        None => catalog.idle().await?,
    };

    let latest_text_version = match request.case_text_version.filter(|v| *v > 0) {
        Some(_) => None,
        None => pool.latest_case_text_version(case.id).await?,
    };

    let new_case_run = NewCaseRun {
        run_id,
        case_id: case.id,
        status_id: status.id,
        assignee_id: resolve_assignee(
            request.assignee_id,
            case.default_tester_id,
            run.default_tester_id,
        ),
        case_text_version: resolve_case_text_version(
            request.case_text_version,
            latest_text_version,
        ),
        build_id: request.build_id.filter(|id| *id != 0).unwrap_or(run.build_id),
        environment_id: run.environment_id,
        notes: request.notes,
        sortkey: request.sortkey,
    };

    let case_run = pool.insert_case_run(new_case_run).await?;
    info!(
        run_id,
        case_run_id = case_run.id,
        case_id = case_run.case_id,
        status = %status.name,
        "Case run added"
    );

    bus.publish(RunEvent::CaseRunSaved {
        run_id,
        case_run_id: case_run.id,
        created: true,
        status_changed: false,
    })
    .await?;

    Ok(HttpResponse::Created().json(CaseRunResponse::new(case_run, Some(&status))))
}

/// Record a new outcome for a case run.
#[utoipa::path(
    put,
    path = "/runs/{run_id}/case_runs/{case_run_id}/status",
    tag = "Case Runs",
    params(
        ("run_id" = i32, Path, description = "Run ID"),
        ("case_run_id" = i32, Path, description = "Case run ID")
    ),
    request_body = UpdateCaseRunStatusRequest,
    responses(
        (status = 200, description = "Case run updated", body = CaseRunResponse),
        (status = 400, description = "No status given", body = crate::error::ErrorResponse),
        (status = 404, description = "Case run or status not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn update_case_run_status(
    pool: web::Data<DbPool>,
    catalog: web::Data<StatusCatalog>,
    bus: web::Data<RunEventBus>,
    path: web::Path<(i32, i32)>,
    body: web::Json<UpdateCaseRunStatusRequest>,
) -> AppResult<HttpResponse> {
    let (run_id, case_run_id) = path.into_inner();
    let request = body.into_inner();

    let status = catalog.resolve(&request.status_ref()?).await?;
    let case_run = pool.require_case_run(run_id, case_run_id).await?;
    let previous_status_id = case_run.status_id;

    let case_run = pool
        .update_case_run_status(case_run, &status, request.tested_by_id)
        .await?;
    let status_changed = previous_status_id != status.id;

    info!(
        run_id,
        case_run_id,
        status = %status.name,
        status_changed,
        "Case run status updated"
    );

    bus.publish(RunEvent::CaseRunSaved {
        run_id,
        case_run_id,
        created: false,
        status_changed,
    })
    .await?;

    Ok(HttpResponse::Ok().json(CaseRunResponse::new(case_run, Some(&status))))
}

/// Change the assignee of a case run.
#[utoipa::path(
    put,
    path = "/runs/{run_id}/case_runs/{case_run_id}/assignee",
    tag = "Case Runs",
    params(
        ("run_id" = i32, Path, description = "Run ID"),
        ("case_run_id" = i32, Path, description = "Case run ID")
    ),
    request_body = UpdateAssigneeRequest,
    responses(
        (status = 200, description = "Case run updated", body = CaseRunResponse),
        (status = 404, description = "Case run not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn update_case_run_assignee(
    pool: web::Data<DbPool>,
    catalog: web::Data<StatusCatalog>,
    bus: web::Data<RunEventBus>,
    path: web::Path<(i32, i32)>,
    body: web::Json<UpdateAssigneeRequest>,
) -> AppResult<HttpResponse> {
    let (run_id, case_run_id) = path.into_inner();
    let assignee_id = body.assignee_id;
    if assignee_id <= 0 {
        return Err(AppError::InvalidInput("assignee_id must be positive".to_string()));
    }

    let case_run = pool.require_case_run(run_id, case_run_id).await?;
    let changed = case_run.assignee_id != Some(assignee_id);

    let case_run = if changed {
        let updated = pool.update_case_run_assignee(case_run, assignee_id).await?;
        info!(run_id, case_run_id, assignee_id, "Case run assignee changed");
        bus.publish(RunEvent::CaseRunAssigneeChanged {
            run_id,
            case_run_ids: vec![case_run_id],
        })
        .await?;
        updated
    } else {
        case_run
    };

    let status = catalog.resolve_by_id(case_run.status_id).await.ok();
    Ok(HttpResponse::Ok().json(CaseRunResponse::new(case_run, status.as_ref())))
}

/// Remove a case run from its run.
#[utoipa::path(
    delete,
    path = "/runs/{run_id}/case_runs/{case_run_id}",
    tag = "Case Runs",
    params(
        ("run_id" = i32, Path, description = "Run ID"),
        ("case_run_id" = i32, Path, description = "Case run ID")
    ),
    responses(
        (status = 204, description = "Case run removed"),
        (status = 404, description = "Case run not found", body = crate::error::ErrorResponse),
    )
)]
pub async fn delete_case_run(
    pool: web::Data<DbPool>,
    bus: web::Data<RunEventBus>,
    path: web::Path<(i32, i32)>,
) -> AppResult<HttpResponse> {
    let (run_id, case_run_id) = path.into_inner();

    let case_run = pool.require_case_run(run_id, case_run_id).await?;
    pool.delete_case_run(case_run).await?;
    info!(run_id, case_run_id, "Case run removed");

    bus.publish(RunEvent::CaseRunDeleted {
        run_id,
        case_run_id,
    })
    .await?;

    Ok(HttpResponse::NoContent().finish())
}

/// Configure case run routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/runs/{run_id}/case_runs")
            .route(web::get().to(list_case_runs))
            .route(web::post().to(add_case_run)),
    )
    .service(
        web::resource("/runs/{run_id}/case_runs/{case_run_id}")
            .route(web::delete().to(delete_case_run)),
    )
    .service(
        web::resource("/runs/{run_id}/case_runs/{case_run_id}/status")
            .route(web::put().to(update_case_run_status)),
    )
    .service(
        web::resource("/runs/{run_id}/case_runs/{case_run_id}/assignee")
            .route(web::put().to(update_case_run_assignee)),
    );
}
