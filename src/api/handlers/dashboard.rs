//! Read-only aggregates shaped for the dashboard's cards and charts.

use actix_web::{web, HttpResponse};
use chrono::Utc;
use rusqlite::Connection;
use serde_json::json;

use crate::api::error::{query_failed, ApiError};
use crate::api::types::AppState;

fn count(conn: &Connection, sql: &str) -> Result<i64, rusqlite::Error> {
    conn.query_row(sql, [], |r| r.get(0))
}

async fn summary(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let conn = state.conn()?;
    let op = "dashboard.summary";

    let students = count(&conn, "SELECT COUNT(*) FROM students")
        .map_err(|e| query_failed(op, e))?;
    let active_students = count(
        &conn,
        "SELECT COUNT(*) FROM students WHERE status = 'active'",
    )
    .map_err(|e| query_failed(op, e))?;
    let avg_progress: f64 = conn
        .query_row("SELECT COALESCE(AVG(progress), 0) FROM students", [], |r| {
            r.get(0)
        })
        .map_err(|e| query_failed(op, e))?;

    let facilitators = count(&conn, "SELECT COUNT(*) FROM facilitators")
        .map_err(|e| query_failed(op, e))?;
    let modules = count(&conn, "SELECT COUNT(*) FROM learning_modules")
        .map_err(|e| query_failed(op, e))?;
    let published_modules = count(
        &conn,
        "SELECT COUNT(*) FROM learning_modules WHERE status = 'published'",
    )
    .map_err(|e| query_failed(op, e))?;

    let assessments = count(&conn, "SELECT COUNT(*) FROM assessments")
        .map_err(|e| query_failed(op, e))?;
    let now = Utc::now().to_rfc3339();
    let upcoming_assessments: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM assessments WHERE scheduled_for >= ?",
            [&now],
            |r| r.get(0),
        )
        .map_err(|e| query_failed(op, e))?;

    let scenarios = count(&conn, "SELECT COUNT(*) FROM simulation_scenarios")
        .map_err(|e| query_failed(op, e))?;
    let results = count(&conn, "SELECT COUNT(*) FROM simulation_results")
        .map_err(|e| query_failed(op, e))?;
    let passed_results = count(
        &conn,
        "SELECT COUNT(*) FROM simulation_results WHERE passed = 1",
    )
    .map_err(|e| query_failed(op, e))?;
    let pass_rate = if results > 0 {
        passed_results as f64 / results as f64
    } else {
        0.0
    };

    let portfolio_items = count(&conn, "SELECT COUNT(*) FROM portfolio_items")
        .map_err(|e| query_failed(op, e))?;
    let reflections = count(&conn, "SELECT COUNT(*) FROM reflections")
        .map_err(|e| query_failed(op, e))?;
    let trajectories = count(&conn, "SELECT COUNT(*) FROM trajectories")
        .map_err(|e| query_failed(op, e))?;

    Ok(HttpResponse::Ok().json(json!({
        "students": { "total": students, "active": active_students, "avg_progress": avg_progress },
        "facilitators": { "total": facilitators },
        "modules": { "total": modules, "published": published_modules },
        "assessments": { "total": assessments, "upcoming": upcoming_assessments },
        "simulations": { "scenarios": scenarios, "results": results, "pass_rate": pass_rate },
        "portfolio_items": portfolio_items,
        "reflections": reflections,
        "trajectories": trajectories
    })))
}

/// One row per scenario, ready for a bar or line series.
async fn simulation_outcomes(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let conn = state.conn()?;
    let mut stmt = conn
        .prepare(
            "SELECT
               sc.id,
               sc.title,
               COUNT(r.id) AS attempts,
               COALESCE(SUM(CASE WHEN r.passed = 1 THEN 1 ELSE 0 END), 0) AS passes,
               COALESCE(AVG(r.score), 0) AS avg_score
             FROM simulation_scenarios sc
             LEFT JOIN simulation_results r ON r.scenario_id = sc.id
             GROUP BY sc.id, sc.title
             ORDER BY sc.title",
        )
        .map_err(|e| query_failed("dashboard.simulation_outcomes", e))?;

    let rows = stmt
        .query_map([], |row| {
            let id: String = row.get(0)?;
            let title: String = row.get(1)?;
            let attempts: i64 = row.get(2)?;
            let passes: i64 = row.get(3)?;
            let avg_score: f64 = row.get(4)?;
            let pass_rate = if attempts > 0 {
                passes as f64 / attempts as f64
            } else {
                0.0
            };
            Ok(json!({
                "scenario_id": id,
                "title": title,
                "attempts": attempts,
                "passes": passes,
                "pass_rate": pass_rate,
                "avg_score": avg_score
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| query_failed("dashboard.simulation_outcomes", e))?;

    Ok(HttpResponse::Ok().json(rows))
}

/// Student counts per progress quartile, for the distribution widget.
async fn progress_distribution(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let conn = state.conn()?;
    let (q1, q2, q3, q4) = conn
        .query_row(
            "SELECT
               COALESCE(SUM(CASE WHEN progress < 25 THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(CASE WHEN progress >= 25 AND progress < 50 THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(CASE WHEN progress >= 50 AND progress < 75 THEN 1 ELSE 0 END), 0),
               COALESCE(SUM(CASE WHEN progress >= 75 THEN 1 ELSE 0 END), 0)
             FROM students",
            [],
            |r| {
                Ok((
                    r.get::<_, i64>(0)?,
                    r.get::<_, i64>(1)?,
                    r.get::<_, i64>(2)?,
                    r.get::<_, i64>(3)?,
                ))
            },
        )
        .map_err(|e| query_failed("dashboard.progress_distribution", e))?;

    Ok(HttpResponse::Ok().json(json!([
        { "bucket": "0-25", "count": q1 },
        { "bucket": "25-50", "count": q2 },
        { "bucket": "50-75", "count": q3 },
        { "bucket": "75-100", "count": q4 }
    ])))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/dashboard/summary").route(web::get().to(summary)))
        .service(
            web::resource("/api/dashboard/simulation-outcomes")
                .route(web::get().to(simulation_outcomes)),
        )
        .service(
            web::resource("/api/dashboard/progress-distribution")
                .route(web::get().to(progress_distribution)),
        );
}
