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
async fn schedule_window_and_kind_filters() {
    let workspace = temp_workspace("coursebook-assessments-window");
    let state = app_state(&workspace);
    let app = test::init_service(App::new().app_data(state.clone()).configure(api::configure))
        .await;

    let module: Value = test::call_and_read_body_json(
        &app,
        test::TestRequest::post()
            .uri("/api/learning-modules")
            .set_json(json!({ "title": "Clinical Skills" }))
            .to_request(),
    )
    .await;
    let module_id = module["id"].as_str().expect("id").to_string();

    for (title, kind, when) in [
        ("January Quiz", "quiz", "2026-01-15T09:00:00+00:00"),
        ("March Exam", "exam", "2026-03-20T09:00:00+00:00"),
        ("June Practical", "practical", "2026-06-05T09:00:00+00:00"),
    ] {
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/assessments")
                .set_json(json!({
                    "module_id": module_id,
                    "title": title,
                    "kind": kind,
                    "scheduled_for": when
                }))
                .to_request(),
        )
        .await;
        assert!(resp.status().is_success());
    }

    // Unfiltered list comes back in schedule order.
    let all: Vec<Value> = test::call_and_read_body_json(
        &app,
        test::TestRequest::get().uri("/api/assessments").to_request(),
    )
    .await;
    let titles: Vec<&str> = all
        .iter()
        .map(|r| r["title"].as_str().expect("title"))
        .collect();
    assert_eq!(titles, vec!["January Quiz", "March Exam", "June Practical"]);

    let spring: Vec<Value> = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/assessments?scheduled_from=2026-02-01T00:00:00%2B00:00&scheduled_to=2026-05-01T00:00:00%2B00:00")
            .to_request(),
    )
    .await;
    assert_eq!(spring.len(), 1);
    assert_eq!(spring[0]["title"], "March Exam");

    let quizzes: Vec<Value> = test::call_and_read_body_json(
        &app,
        test::TestRequest::get()
            .uri("/api/assessments?kind=quiz")
            .to_request(),
    )
    .await;
    assert_eq!(quizzes.len(), 1);
    assert_eq!(quizzes[0]["kind"], "quiz");

    let _ = std::fs::remove_dir_all(workspace);
}
