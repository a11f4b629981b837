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
async fn summary_reflects_seeded_rows() {
    let workspace = temp_workspace("coursebook-dashboard-summary");
    let state = app_state(&workspace);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure))
        .await;

    for (name, status, progress) in [
        ("Avery Quinn", "active", 40.0),
        ("Brooke Lane", "active", 60.0),
        ("Casey Reed", "inactive", 10.0),
    ] {
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/students")
                .set_json(json!({ "full_name": name, "status": status, "progress": progress }))
                .to_request(),
        )
        .await;
        assert!(resp.status().is_success());
    }

    let _: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/learning-modules")
            .set_json(json!({ "title": "Published", "status": "published" }))
            .to_request(),
    )
    .await;
    let _: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/learning-modules")
            .set_json(json!({ "title": "Draft" }))
            .to_request(),
    )
    .await;

    let summary: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/dashboard/summary")
            .to_request(),
    )
    .await;
    assert_eq!(summary["students"]["total"], 3);
    assert_eq!(summary["students"]["active"], 2);
    let avg = summary["students"]["avg_progress"].as_f64().expect("avg");
    assert!((avg - 36.666).abs() < 0.01);
    assert_eq!(summary["modules"]["total"], 2);
    assert_eq!(summary["modules"]["published"], 1);
    assert_eq!(summary["simulations"]["results"], 0);
    assert_eq!(summary["simulations"]["pass_rate"], 0.0);

    let _ = std::fs::remove_dir_all(workspace);
}

#[actix_web::test]
async fn simulation_outcomes_aggregate_per_scenario() {
    let workspace = temp_workspace("coursebook-dashboard-outcomes");
    let state = app_state(&workspace);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure))
        .await;

    let student: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/students")
            .set_json(json!({ "full_name": "Avery Quinn" }))
            .to_request(),
    )
    .await;
    let student_id = student["id"].as_str().expect("id").to_string();

    let busy: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/simulation-scenarios")
            .set_json(json!({ "title": "Busy Scenario" }))
            .to_request(),
    )
    .await;
    let busy_id = busy["id"].as_str().expect("id").to_string();
    let _: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/simulation-scenarios")
            .set_json(json!({ "title": "Quiet Scenario" }))
            .to_request(),
    )
    .await;

    for (score, passed) in [(50.0, false), (70.0, true), (90.0, true), (80.0, true)] {
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/simulation-results")
                .set_json(json!({
                    "scenario_id": busy_id,
                    "student_id": student_id,
                    "score": score,
                    "passed": passed
                }))
                .to_request(),
        )
        .await;
        assert!(resp.status().is_success());
    }

    let outcomes: Vec<Value> = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/dashboard/simulation-outcomes")
            .to_request(),
    )
    .await;
    assert_eq!(outcomes.len(), 2);
    // Ordered by title: Busy before Quiet.
    assert_eq!(outcomes[0]["title"], "Busy Scenario");
    assert_eq!(outcomes[0]["attempts"], 4);
    assert_eq!(outcomes[0]["passes"], 3);
    assert_eq!(outcomes[0]["pass_rate"], 0.75);
    let avg = outcomes[0]["avg_score"].as_f64().expect("avg");
    assert!((avg - 72.5).abs() < 1e-9);
    assert_eq!(outcomes[1]["title"], "Quiet Scenario");
    assert_eq!(outcomes[1]["attempts"], 0);
    assert_eq!(outcomes[1]["pass_rate"], 0.0);

    let _ = std::fs::remove_dir_all(workspace);
}

#[actix_web::test]
async fn progress_distribution_buckets_students() {
    let workspace = temp_workspace("coursebook-dashboard-distribution");
    let state = app_state(&workspace);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure))
        .await;

    for (name, progress) in [
        ("A Student", 5.0),
        ("B Student", 30.0),
        ("C Student", 55.0),
        ("D Student", 75.0),
        ("E Student", 99.0),
    ] {
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/students")
                .set_json(json!({ "full_name": name, "progress": progress }))
                .to_request(),
        )
        .await;
        assert!(resp.status().is_success());
    }

    let buckets: Vec<Value> = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/dashboard/progress-distribution")
            .to_request(),
    )
    .await;
    assert_eq!(buckets.len(), 4);
    assert_eq!(buckets[0]["count"], 1);
    assert_eq!(buckets[1]["count"], 1);
    assert_eq!(buckets[2]["count"], 1);
    assert_eq!(buckets[3]["count"], 2);

    let _ = std::fs::remove_dir_all(workspace);
}
