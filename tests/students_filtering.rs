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

macro_rules! seed_student {
    ($app:expr, $body:expr) => {{
        let resp = test::call_service(
            $app,
            test::TestRequest::post()
                .uri("/api/students")
                .set_json($body)
                .to_request(),
        )
        .await;
        assert!(resp.status().is_success());
    }};
}

#[actix_web::test]
async fn unfiltered_list_is_sorted_by_name() {
    let workspace = temp_workspace("coursebook-students-sort");
    let state = app_state(&workspace);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure))
        .await;

    seed_student!(&app, json!({ "full_name": "Casey Reed", "group_name": "B" }));
    seed_student!(&app, json!({ "full_name": "Avery Quinn", "group_name": "A" }));
    seed_student!(&app, json!({ "full_name": "Brooke Lane", "group_name": "A" }));

    let rows: Vec<Value> = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/students").to_request(),
    )
    .await;
    let names: Vec<&str> = rows
        .iter()
        .map(|r| r["full_name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["Avery Quinn", "Brooke Lane", "Casey Reed"]);

    let _ = std::fs::remove_dir_all(workspace);
}

#[actix_web::test]
async fn equality_filter_returns_only_matches() {
    let workspace = temp_workspace("coursebook-students-eq");
    let state = app_state(&workspace);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure))
        .await;

    seed_student!(&app, json!({ "full_name": "Avery Quinn", "group_name": "A" }));
    seed_student!(&app, json!({ "full_name": "Brooke Lane", "group_name": "A" }));
    seed_student!(
        &app,
        json!({ "full_name": "Casey Reed", "group_name": "B", "status": "inactive" })
    );

    let group_a: Vec<Value> = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/students?group=A")
            .to_request(),
    )
    .await;
    assert_eq!(group_a.len(), 2);
    assert!(group_a.iter().all(|r| r["group_name"] == "A"));

    let inactive: Vec<Value> = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/students?status=inactive")
            .to_request(),
    )
    .await;
    assert_eq!(inactive.len(), 1);
    assert_eq!(inactive[0]["full_name"], "Casey Reed");

    let _ = std::fs::remove_dir_all(workspace);
}

#[actix_web::test]
async fn pattern_and_range_filters_combine() {
    let workspace = temp_workspace("coursebook-students-range");
    let state = app_state(&workspace);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure))
        .await;

    seed_student!(
        &app,
        json!({ "full_name": "Avery Quinn", "enrolled_at": "2026-01-10T00:00:00+00:00" })
    );
    seed_student!(
        &app,
        json!({ "full_name": "Avery Stone", "enrolled_at": "2026-03-10T00:00:00+00:00" })
    );
    seed_student!(
        &app,
        json!({ "full_name": "Brooke Lane", "enrolled_at": "2026-03-15T00:00:00+00:00" })
    );

    let averys: Vec<Value> = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/students?name=Avery&enrolled_from=2026-02-01T00:00:00%2B00:00")
            .to_request(),
    )
    .await;
    assert_eq!(averys.len(), 1);
    assert_eq!(averys[0]["full_name"], "Avery Stone");

    let _ = std::fs::remove_dir_all(workspace);
}
