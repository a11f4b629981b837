use actix_web::{web, HttpResponse};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::error::{delete_failed, insert_failed, query_failed, update_failed, ApiError};
use crate::api::types::AppState;
use crate::query::Predicates;

const COLUMNS: &str =
    "id, scenario_id, student_id, score, passed, duration_seconds, completed_at";

#[derive(Debug, Serialize)]
pub struct SimulationResultRow {
    pub id: String,
    pub scenario_id: String,
    pub student_id: String,
    pub score: f64,
    pub passed: bool,
    pub duration_seconds: i64,
    pub completed_at: String,
}

fn row_to_result(row: &rusqlite::Row<'_>) -> rusqlite::Result<SimulationResultRow> {
    Ok(SimulationResultRow {
        id: row.get(0)?,
        scenario_id: row.get(1)?,
        student_id: row.get(2)?,
        score: row.get(3)?,
        passed: row.get::<_, i64>(4)? != 0,
        duration_seconds: row.get(5)?,
        completed_at: row.get(6)?,
    })
}

fn fetch_result(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<Option<SimulationResultRow>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {} FROM simulation_results WHERE id = ?", COLUMNS),
        [id],
        row_to_result,
    )
    .optional()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListQuery {
    scenario_id: Option<String>,
    student_id: Option<String>,
    passed: Option<bool>,
    score_min: Option<f64>,
    score_max: Option<f64>,
    completed_from: Option<String>,
    completed_to: Option<String>,
}

async fn list(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    let mut preds = Predicates::new();
    preds.eq("scenario_id", q.scenario_id);
    preds.eq("student_id", q.student_id);
    preds.eq("passed", q.passed.map(|b| Value::Integer(i64::from(b))));
    preds.gte("score", q.score_min);
    preds.lte("score", q.score_max);
    preds.gte("completed_at", q.completed_from);
    preds.lte("completed_at", q.completed_to);

    let conn = state.conn()?;
    let sql = format!(
        "SELECT {} FROM simulation_results{} ORDER BY completed_at DESC",
        COLUMNS,
        preds.where_clause()
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| query_failed("simulations.list", e))?;
    let rows = stmt
        .query_map(params_from_iter(preds.values()), row_to_result)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| query_failed("simulations.list", e))?;
    Ok(HttpResponse::Ok().json(rows))
}

async fn get(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;
    match fetch_result(&conn, &id).map_err(|e| query_failed("simulations.get", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("simulation result not found")),
    }
}

#[derive(Debug, Deserialize)]
struct CreateBody {
    scenario_id: String,
    student_id: String,
    score: f64,
    passed: bool,
    #[serde(default)]
    duration_seconds: i64,
    completed_at: Option<String>,
}

async fn create(
    state: web::Data<AppState>,
    body: web::Json<CreateBody>,
) -> Result<HttpResponse, ApiError> {
    let b = body.into_inner();
    let id = Uuid::new_v4().to_string();
    let completed_at = b.completed_at.unwrap_or_else(|| Utc::now().to_rfc3339());
    let conn = state.conn()?;
    conn.execute(
        "INSERT INTO simulation_results(id, scenario_id, student_id, score, passed,
                                        duration_seconds, completed_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            b.scenario_id,
            b.student_id,
            b.score,
            b.passed,
            b.duration_seconds,
            completed_at
        ],
    )
    .map_err(|e| insert_failed("simulations.create", e))?;

    match fetch_result(&conn, &id).map_err(|e| query_failed("simulations.create", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("simulation result not found")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateBody {
    score: Option<f64>,
    passed: Option<bool>,
    duration_seconds: Option<i64>,
    completed_at: Option<String>,
}

async fn update(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateBody>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let b = body.into_inner();

    let mut sets: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    if let Some(v) = b.score {
        sets.push("score = ?");
        values.push(Value::Real(v));
    }
    if let Some(v) = b.passed {
        sets.push("passed = ?");
        values.push(Value::Integer(i64::from(v)));
    }
    if let Some(v) = b.duration_seconds {
        sets.push("duration_seconds = ?");
        values.push(Value::Integer(v));
    }
    if let Some(v) = b.completed_at {
        sets.push("completed_at = ?");
        values.push(Value::Text(v));
    }
    if sets.is_empty() {
        return Err(ApiError::bad_params("empty patch"));
    }
    values.push(Value::Text(id.clone()));

    let conn = state.conn()?;
    let changed = conn
        .execute(
            &format!(
                "UPDATE simulation_results SET {} WHERE id = ?",
                sets.join(", ")
            ),
            params_from_iter(values.iter()),
        )
        .map_err(|e| update_failed("simulations.update", e))?;
    if changed == 0 {
        return Err(ApiError::not_found("simulation result not found"));
    }

    match fetch_result(&conn, &id).map_err(|e| query_failed("simulations.update", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("simulation result not found")),
    }
}

async fn delete(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;

    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM simulation_results WHERE id = ?", [&id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(|e| query_failed("simulations.delete", e))?;
    if exists.is_none() {
        return Err(ApiError::not_found("simulation result not found"));
    }

    conn.execute("DELETE FROM simulation_results WHERE id = ?", [&id])
        .map_err(|e| delete_failed("simulations.delete", e))?;

    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/simulation-results")
            .route(web::get().to(list))
            .route(web::post().to(create)),
    )
    .service(
        web::resource("/api/simulation-results/{id}")
            .route(web::get().to(get))
            .route(web::patch().to(update))
            .route(web::delete().to(delete)),
    );
}
