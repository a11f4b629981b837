use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};

use coursebookd::api::{self, AppState};
use coursebookd::config::AiConfig;
use coursebookd::db;

fn temp_workspace(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn app_state(workspace: &Path) -> web::Data<AppState> {
    let conn = db::open_db(workspace).expect("open db");
    let ai = AiConfig {
        simulate_delay_ms: 0,
        ..AiConfig::default()
    };
    web::Data::new(AppState::new(conn, ai))
}

#[actix_web::test]
async fn create_update_delete_roundtrip() {
    let workspace = temp_workspace("coursebook-students-crud");
    let state = app_state(&workspace);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure))
        .await;

    let created: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/students")
            .set_json(json!({
                "full_name": "Avery Quinn",
                "email": "avery@example.org",
                "group_name": "Cohort A",
                "progress": 12.5
            }))
            .to_request(),
    )
    .await;
    let id = created["id"].as_str().expect("id").to_string();
    assert_eq!(created["status"], "active");
    assert_eq!(created["progress"], 12.5);

    let fetched: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/students/{}", id))
            .to_request(),
    )
    .await;
    assert_eq!(fetched["full_name"], "Avery Quinn");

    let updated: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::patch()
            .uri(&format!("/api/students/{}", id))
            .set_json(json!({ "status": "graduated", "progress": 100.0 }))
            .to_request(),
    )
    .await;
    assert_eq!(updated["status"], "graduated");
    assert_eq!(updated["progress"], 100.0);
    // Untouched fields survive the patch.
    assert_eq!(updated["email"], "avery@example.org");

    let deleted: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::delete()
            .uri(&format!("/api/students/{}", id))
            .to_request(),
    )
    .await;
    assert_eq!(deleted["deleted"], true);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri(&format!("/api/students/{}", id))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let _ = std::fs::remove_dir_all(workspace);
}

#[actix_web::test]
async fn delete_takes_dependent_rows_along() {
    let workspace = temp_workspace("coursebook-students-cascade");
    let state = app_state(&workspace);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure))
        .await;

    let student: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/students")
            .set_json(json!({ "full_name": "Brooke Lane" }))
            .to_request(),
    )
    .await;
    let id = student["id"].as_str().expect("id").to_string();

    let _: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/portfolio-items")
            .set_json(json!({ "student_id": id, "title": "Case study", "kind": "report" }))
            .to_request(),
    )
    .await;
    let _: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/reflections")
            .set_json(json!({ "student_id": id, "body": "first week notes" }))
            .to_request(),
    )
    .await;

    let resp = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri(&format!("/api/students/{}", id))
            .to_request(),
    )
    .await;
    assert!(resp.status().is_success());

    let items: Vec<Value> = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/portfolio-items")
            .to_request(),
    )
    .await;
    assert!(items.is_empty());
    let reflections: Vec<Value> = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/reflections").to_request(),
    )
    .await;
    assert!(reflections.is_empty());

    let _ = std::fs::remove_dir_all(workspace);
}

#[actix_web::test]
async fn blank_name_is_rejected() {
    let workspace = temp_workspace("coursebook-students-blank");
    let state = app_state(&workspace);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure))
        .await;

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/students")
            .set_json(json!({ "full_name": "   " }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "bad_params");

    let _ = std::fs::remove_dir_all(workspace);
}
