//! Case run status catalog API handlers.

use actix_web::{HttpResponse, web};

use crate::error::AppResult;
use crate::models::{NewStatus, RenameStatusRequest, StatusDefinition, StatusListResponse};
use crate::services::StatusCatalog;

/// List the status catalog.
#[utoipa::path(
    get,
    path = "/statuses",
    tag = "Statuses",
    responses(
        (status = 200, description = "Status catalog ordered by id", body = StatusListResponse),
    )
)]
pub async fn list_statuses(catalog: web::Data<StatusCatalog>) -> AppResult<HttpResponse> {
    let statuses = catalog.all().await?.as_ref().clone();
    Ok(HttpResponse::Ok().json(StatusListResponse { statuses }))
}

/// Look up a status by id or (case-insensitive) name.
#[utoipa::path(
    get,
    path = "/statuses/{status}",
    tag = "Statuses",
    params(("status" = String, Path, description = "Status id or name")),
    responses(
        (status = 200, description = "Status", body = StatusDefinition),
        (status = 404, description = "Unknown status", body = crate::error::ErrorResponse),
    )
)]
pub async fn get_status(
    catalog: web::Data<StatusCatalog>,
    path: web::Path<String>,
) -> AppResult<HttpResponse> {
    let key = path.into_inner();
    let status = match key.trim().parse::<i32>() {
        Ok(id) => catalog.resolve_by_id(id).await?,
        Err(_) => catalog.resolve_by_name(&key).await?,
    };
    Ok(HttpResponse::Ok().json(status))
}

/// Add a status to the catalog.
#[utoipa::path(
    post,
    path = "/statuses",
    tag = "Statuses",
    request_body = NewStatus,
    responses(
        (status = 201, description = "Status created", body = StatusDefinition),
        (status = 400, description = "Invalid or duplicate name", body = crate::error::ErrorResponse),
    )
)]
pub async fn create_status(
    catalog: web::Data<StatusCatalog>,
    body: web::Json<NewStatus>,
) -> AppResult<HttpResponse> {
    let status = catalog.create(body.into_inner()).await?;
    Ok(HttpResponse::Created().json(status))
}

/// Rename a status.
#[utoipa::path(
    put,
    path = "/statuses/{status}",
    tag = "Statuses",
    params(("status" = i32, Path, description = "Status ID")),
    request_body = RenameStatusRequest,
    responses(
        (status = 200, description = "Status renamed", body = StatusDefinition),
        (status = 400, description = "Invalid or duplicate name", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown status", body = crate::error::ErrorResponse),
    )
)]
pub async fn rename_status(
    catalog: web::Data<StatusCatalog>,
    path: web::Path<i32>,
    body: web::Json<RenameStatusRequest>,
) -> AppResult<HttpResponse> {
    let status = catalog.rename(path.into_inner(), &body.name).await?;
    Ok(HttpResponse::Ok().json(status))
}

/// Delete a status.
#[utoipa::path(
    delete,
    path = "/statuses/{status}",
    tag = "Statuses",
    params(("status" = i32, Path, description = "Status ID")),
    responses(
        (status = 204, description = "Status deleted"),
        (status = 400, description = "Status still used by case runs", body = crate::error::ErrorResponse),
        (status = 404, description = "Unknown status", body = crate::error::ErrorResponse),
    )
)]
pub async fn delete_status(
    catalog: web::Data<StatusCatalog>,
    path: web::Path<i32>,
) -> AppResult<HttpResponse> {
    catalog.delete(path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Configure status catalog routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/statuses")
            .route(web::get().to(list_statuses))
            .route(web::post().to(create_status)),
    )
    .service(
        web::resource("/statuses/{status}")
            .route(web::get().to(get_status))
            .route(web::put().to(rename_status))
            .route(web::delete().to(delete_status)),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use actix_web::{App, http::StatusCode, test};
    use serde_json::{Value, json};

    use crate::services::StatusCache;
    use crate::test_support::InMemoryStore;

    fn catalog() -> web::Data<StatusCatalog> {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        web::Data::new(StatusCatalog::new(store, StatusCache::default()))
    }

    #[actix_web::test]
    async fn test_list_statuses() {
        let app = test::init_service(
            App::new()
                .app_data(catalog())
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/statuses").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        let statuses = body["statuses"].as_array().unwrap();
        assert_eq!(statuses.len(), 8);
        assert_eq!(statuses[0]["name"], "IDLE");
    }

    #[actix_web::test]
    async fn test_get_status_by_name_and_id() {
        let app = test::init_service(
            App::new()
                .app_data(catalog())
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/statuses/failed").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["id"], 3);

        let req = test::TestRequest::get().uri("/statuses/3").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["name"], "FAILED");

        let req = test::TestRequest::get().uri("/statuses/bogus").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_rename_then_lookup_old_name_fails() {
        let app = test::init_service(
            App::new()
                .app_data(catalog())
                .configure(configure_routes),
        )
        .await;

        // Warm the cache
        let req = test::TestRequest::get().uri("/statuses/waived").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let req = test::TestRequest::put()
            .uri("/statuses/8")
            .set_json(json!({ "name": "skipped" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["name"], "SKIPPED");

        let req = test::TestRequest::get().uri("/statuses/waived").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::get().uri("/statuses/skipped").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[actix_web::test]
    async fn test_create_duplicate_status_is_bad_request() {
        let app = test::init_service(
            App::new()
                .app_data(catalog())
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/statuses")
            .set_json(json!({ "name": "Passed" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_delete_status_in_use_is_bad_request() {
        let store = Arc::new(InMemoryStore::with_default_statuses());
        let run_id = store.insert_run(false);
        let case_run_id = store.add_case_run(run_id, 8);
        let catalog = web::Data::new(StatusCatalog::new(store.clone(), StatusCache::default()));
        let app = test::init_service(
            App::new()
                .app_data(catalog)
                .configure(configure_routes),
        )
        .await;

        let req = test::TestRequest::delete().uri("/statuses/8").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(store.run(run_id).is_some());

        store.remove_case_run(case_run_id);
        let req = test::TestRequest::delete().uri("/statuses/8").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }
}
