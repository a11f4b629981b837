use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

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
async fn every_route_family_answers() {
    let workspace = temp_workspace("coursebook-api-smoke");
    let state = app_state(&workspace);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure))
        .await;

    let health: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/health").to_request(),
    )
    .await;
    assert_eq!(health["database"], "ok");

    let student: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/students")
            .set_json(json!({ "full_name": "Smoke Student", "group_name": "S1" }))
            .to_request(),
    )
    .await;
    let student_id = student["id"].as_str().expect("student id").to_string();

    let facilitator: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/facilitators")
            .set_json(json!({ "full_name": "Smoke Facilitator", "department": "Care" }))
            .to_request(),
    )
    .await;
    assert!(facilitator["active"].as_bool().expect("active flag"));

    let module: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/learning-modules")
            .set_json(json!({ "title": "Smoke Module", "estimated_load": 30 }))
            .to_request(),
    )
    .await;
    let module_id = module["id"].as_str().expect("module id").to_string();

    let assessment: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/assessments")
            .set_json(json!({
                "module_id": module_id,
                "title": "Smoke Quiz",
                "kind": "quiz",
                "scheduled_for": "2026-09-01T09:00:00+00:00"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(assessment["status"], "planned");

    let item: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/portfolio-items")
            .set_json(json!({ "student_id": student_id, "title": "Smoke Item", "kind": "essay" }))
            .to_request(),
    )
    .await;
    assert_eq!(item["kind"], "essay");

    let reflection: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/reflections")
            .set_json(json!({ "student_id": student_id, "body": "smoke reflection" }))
            .to_request(),
    )
    .await;
    assert_eq!(reflection["body"], "smoke reflection");

    let scenario: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/simulation-scenarios")
            .set_json(json!({ "title": "Smoke Scenario", "category": "triage" }))
            .to_request(),
    )
    .await;
    let scenario_id = scenario["id"].as_str().expect("scenario id").to_string();

    let result: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/simulation-results")
            .set_json(json!({
                "scenario_id": scenario_id,
                "student_id": student_id,
                "score": 81.5,
                "passed": true
            }))
            .to_request(),
    )
    .await;
    assert!(result["passed"].as_bool().expect("passed flag"));

    let trajectory: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/trajectories")
            .set_json(json!({ "student_id": student_id, "title": "Smoke Path" }))
            .to_request(),
    )
    .await;
    assert_eq!(trajectory["status"], "draft");

    for uri in [
        "/api/students",
        "/api/facilitators",
        "/api/learning-modules",
        "/api/assessments",
        "/api/portfolio-items",
        "/api/reflections",
        "/api/simulation-scenarios",
        "/api/simulation-results",
        "/api/trajectories",
        "/api/dashboard/summary",
        "/api/dashboard/simulation-outcomes",
        "/api/dashboard/progress-distribution",
    ] {
        let resp = test::call_service(&app, test::TestRequest::get().uri(uri).to_request()).await;
        assert!(resp.status().is_success(), "GET {} failed", uri);
    }

    let generated: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/generate-content")
            .set_json(json!({
                "context": "smoke",
                "type": "quiz",
                "complexity": "basic",
                "language": "en"
            }))
            .to_request(),
    )
    .await;
    assert_eq!(generated["type"], "quiz");

    let _ = std::fs::remove_dir_all(workspace);
}
