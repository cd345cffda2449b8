//! End-to-end run completion flows over the in-memory store.
//!
//! Case run changes go through the run event bus the same way the API
//! handlers publish them; finish/reopen go through the HTTP routes.

use std::sync::Arc;

use actix_web::{App, http::StatusCode, test, web};
use serde_json::Value;

use test_run_tracker_lib::api::test_runs::configure_completion_routes;
use test_run_tracker_lib::config::NotificationConfig;
use test_run_tracker_lib::models::RunEvent;
use test_run_tracker_lib::models::status::{FAILED, IDLE, PASSED};
use test_run_tracker_lib::services::{
    RunEventBus, RunLifecycle, RunNotifier, StatusCache, StatusCatalog, completed_percentage,
};
use test_run_tracker_lib::test_support::{InMemoryStore, RecordingMailer};

struct Harness {
    store: Arc<InMemoryStore>,
    catalog: Arc<StatusCatalog>,
    lifecycle: Arc<RunLifecycle>,
    mailer: Arc<RecordingMailer>,
    bus: RunEventBus,
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryStore::with_default_statuses());
    let catalog = Arc::new(StatusCatalog::new(store.clone(), StatusCache::default()));
    let lifecycle = Arc::new(RunLifecycle::new(store.clone(), catalog.clone()));
    let mailer = Arc::new(RecordingMailer::default());
    let notifier = RunNotifier::new(
        store.clone(),
        mailer.clone(),
        NotificationConfig {
            enabled: true,
            from_address: "tcms@example.com".to_string(),
            base_url: "https://tcms.example.com/".to_string(),
        },
    )
    .unwrap();
    let bus = RunEventBus::standard(store.clone(), lifecycle.clone(), Arc::new(notifier));

    Harness {
        store,
        catalog,
        lifecycle,
        mailer,
        bus,
    }
}

async fn status_id(catalog: &StatusCatalog, name: &str) -> i32 {
    catalog.resolve_by_name(name).await.unwrap().id
}

#[tokio::test]
async fn test_auto_run_closes_and_reopens_with_its_case_runs() {
    let h = harness();
    let passed = status_id(&h.catalog, PASSED).await;
    let idle = status_id(&h.catalog, IDLE).await;

    let run_id = h.store.insert_run(true);
    let first = h.store.add_case_run(run_id, idle);
    h.bus
        .publish(RunEvent::CaseRunSaved {
            run_id,
            case_run_id: first,
            created: true,
            status_changed: false,
        })
        .await
        .unwrap();
    assert!(h.store.run(run_id).unwrap().stop_date.is_none());

    let second = h.store.add_case_run(run_id, passed);
    h.store.set_case_run_status(first, passed);
    h.bus
        .publish(RunEvent::CaseRunSaved {
            run_id,
            case_run_id: first,
            created: false,
            status_changed: true,
        })
        .await
        .unwrap();
    assert!(h.store.run(run_id).unwrap().stop_date.is_some());

    // One case run regresses
    h.store.set_case_run_status(second, idle);
    h.bus
        .publish(RunEvent::CaseRunSaved {
            run_id,
            case_run_id: second,
            created: false,
            status_changed: true,
        })
        .await
        .unwrap();
    assert!(h.store.run(run_id).unwrap().stop_date.is_none());

    // Removing the idle case run leaves only passed ones
    h.store.set_attachments(second, 2);
    h.store.remove_case_run(second);
    h.bus
        .publish(RunEvent::CaseRunDeleted {
            run_id,
            case_run_id: second,
        })
        .await
        .unwrap();
    assert_eq!(h.store.attachments(second), 0);
    assert!(h.store.run(run_id).unwrap().stop_date.is_some());
}

#[tokio::test]
async fn test_manual_run_ignores_case_run_changes() {
    let h = harness();
    let passed = status_id(&h.catalog, PASSED).await;

    let run_id = h.store.insert_run(false);
    let case_run_id = h.store.add_case_run(run_id, passed);
    h.bus
        .publish(RunEvent::CaseRunSaved {
            run_id,
            case_run_id,
            created: true,
            status_changed: false,
        })
        .await
        .unwrap();

    let subtotal = h.lifecycle.subtotal(run_id).await.unwrap();
    assert_eq!(completed_percentage(&subtotal), 100.0);
    assert!(h.store.run(run_id).unwrap().stop_date.is_none());
    assert_eq!(h.store.stop_date_writes(), 0);
}

#[tokio::test]
async fn test_subtotal_reports_failures_among_completed() {
    let h = harness();
    let passed = status_id(&h.catalog, PASSED).await;
    let failed = status_id(&h.catalog, FAILED).await;
    let idle = status_id(&h.catalog, IDLE).await;

    let run_id = h.store.insert_run(false);
    for status in [passed, passed, failed, idle] {
        h.store.add_case_run(run_id, status);
    }

    let subtotal = h.lifecycle.subtotal(run_id).await.unwrap();
    assert_eq!(subtotal.total, 4);
    assert_eq!(subtotal.per_status.len(), 8);
    assert_eq!(subtotal.complete_percent, 75.0);
    assert!((subtotal.failure_percent - 100.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_new_run_mail_goes_to_every_recipient_once() {
    let h = harness();
    let run_id = h.store.insert_run(false);
    h.store.set_recipients(
        run_id,
        vec!["manager@example.com", "cc@example.com", "manager@example.com"],
    );

    h.bus.publish(RunEvent::RunCreated { run_id }).await.unwrap();

    let sent = h.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, vec!["cc@example.com", "manager@example.com"]);
    assert!(sent[0].body.contains("https://tcms.example.com/runs/"));
}

#[actix_web::test]
async fn test_finish_and_reopen_routes() {
    let h = harness();
    let run_id = h.store.insert_run(false);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(h.lifecycle.clone()))
            .configure(configure_completion_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri(&format!("/runs/{}/finish", run_id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["outcome"], "finished");
    assert_eq!(body["run"]["status"], "finished");
    assert!(h.store.run(run_id).unwrap().stop_date.is_some());

    let req = test::TestRequest::post()
        .uri(&format!("/runs/{}/reopen", run_id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["outcome"], "reopened");
    assert!(h.store.run(run_id).unwrap().stop_date.is_none());

    let req = test::TestRequest::post().uri("/runs/9999/finish").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn test_finish_route_ignores_auto_runs() {
    let h = harness();
    let run_id = h.store.insert_run(true);
    let app = test::init_service(
        App::new()
            .app_data(web::Data::from(h.lifecycle.clone()))
            .configure(configure_completion_routes),
    )
    .await;

    let req = test::TestRequest::post()
        .uri(&format!("/runs/{}/finish", run_id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["outcome"], "ignored");
    assert!(h.store.run(run_id).unwrap().stop_date.is_none());
}
