use actix_web::{web, HttpResponse};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::error::{delete_failed, insert_failed, query_failed, update_failed, ApiError};
use crate::api::types::AppState;
use crate::query::Predicates;

const COLUMNS: &str =
    "id, module_id, title, kind, max_score, passing_score, scheduled_for, status";

#[derive(Debug, Serialize)]
pub struct AssessmentRow {
    pub id: String,
    pub module_id: String,
    pub title: String,
    pub kind: String,
    pub max_score: f64,
    pub passing_score: f64,
    pub scheduled_for: Option<String>,
    pub status: String,
}

fn row_to_assessment(row: &rusqlite::Row<'_>) -> rusqlite::Result<AssessmentRow> {
    Ok(AssessmentRow {
        id: row.get(0)?,
        module_id: row.get(1)?,
        title: row.get(2)?,
        kind: row.get(3)?,
        max_score: row.get(4)?,
        passing_score: row.get(5)?,
        scheduled_for: row.get(6)?,
        status: row.get(7)?,
    })
}

fn fetch_assessment(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<Option<AssessmentRow>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {} FROM assessments WHERE id = ?", COLUMNS),
        [id],
        row_to_assessment,
    )
    .optional()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListQuery {
    module_id: Option<String>,
    kind: Option<String>,
    status: Option<String>,
    title: Option<String>,
    scheduled_from: Option<String>,
    scheduled_to: Option<String>,
}

async fn list(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    let mut preds = Predicates::new();
    preds.eq("module_id", q.module_id);
    preds.eq("kind", q.kind);
    preds.eq("status", q.status);
    preds.like("title", q.title);
    preds.gte("scheduled_for", q.scheduled_from);
    preds.lte("scheduled_for", q.scheduled_to);

    let conn = state.conn()?;
    let sql = format!(
        "SELECT {} FROM assessments{} ORDER BY scheduled_for",
        COLUMNS,
        preds.where_clause()
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| query_failed("assessments.list", e))?;
    let rows = stmt
        .query_map(params_from_iter(preds.values()), row_to_assessment)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| query_failed("assessments.list", e))?;
    Ok(HttpResponse::Ok().json(rows))
}

async fn get(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;
    match fetch_assessment(&conn, &id).map_err(|e| query_failed("assessments.get", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("assessment not found")),
    }
}

#[derive(Debug, Deserialize)]
struct CreateBody {
    module_id: String,
    title: String,
    kind: String,
    #[serde(default = "default_max_score")]
    max_score: f64,
    #[serde(default = "default_passing_score")]
    passing_score: f64,
    scheduled_for: Option<String>,
    #[serde(default = "default_assessment_status")]
    status: String,
}

fn default_max_score() -> f64 {
    100.0
}

fn default_passing_score() -> f64 {
    50.0
}

fn default_assessment_status() -> String {
    "planned".to_string()
}

async fn create(
    state: web::Data<AppState>,
    body: web::Json<CreateBody>,
) -> Result<HttpResponse, ApiError> {
    let b = body.into_inner();
    let title = b.title.trim().to_string();
    if title.is_empty() {
        return Err(ApiError::bad_params("title must not be empty"));
    }

    let id = Uuid::new_v4().to_string();
    let conn = state.conn()?;
    conn.execute(
        "INSERT INTO assessments(id, module_id, title, kind, max_score, passing_score,
                                 scheduled_for, status)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            b.module_id,
            title,
            b.kind,
            b.max_score,
            b.passing_score,
            b.scheduled_for,
            b.status
        ],
    )
    .map_err(|e| insert_failed("assessments.create", e))?;

    match fetch_assessment(&conn, &id).map_err(|e| query_failed("assessments.create", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("assessment not found")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateBody {
    title: Option<String>,
    kind: Option<String>,
    max_score: Option<f64>,
    passing_score: Option<f64>,
    scheduled_for: Option<String>,
    status: Option<String>,
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
    if let Some(v) = b.title {
        let v = v.trim().to_string();
        if v.is_empty() {
            return Err(ApiError::bad_params("title must not be empty"));
        }
        sets.push("title = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.kind {
        sets.push("kind = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.max_score {
        sets.push("max_score = ?");
        values.push(Value::Real(v));
    }
    if let Some(v) = b.passing_score {
        sets.push("passing_score = ?");
        values.push(Value::Real(v));
    }
    if let Some(v) = b.scheduled_for {
        sets.push("scheduled_for = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.status {
        sets.push("status = ?");
        values.push(Value::Text(v));
    }
    if sets.is_empty() {
        return Err(ApiError::bad_params("empty patch"));
    }
    values.push(Value::Text(id.clone()));

    let conn = state.conn()?;
    let changed = conn
        .execute(
            &format!("UPDATE assessments SET {} WHERE id = ?", sets.join(", ")),
            params_from_iter(values.iter()),
        )
        .map_err(|e| update_failed("assessments.update", e))?;
    if changed == 0 {
        return Err(ApiError::not_found("assessment not found"));
    }

    match fetch_assessment(&conn, &id).map_err(|e| query_failed("assessments.update", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("assessment not found")),
    }
}

async fn delete(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;

    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM assessments WHERE id = ?", [&id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(|e| query_failed("assessments.delete", e))?;
    if exists.is_none() {
        return Err(ApiError::not_found("assessment not found"));
    }

    conn.execute("DELETE FROM assessments WHERE id = ?", [&id])
        .map_err(|e| delete_failed("assessments.delete", e))?;

    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/assessments")
            .route(web::get().to(list))
            .route(web::post().to(create)),
    )
    .service(
        web::resource("/api/assessments/{id}")
            .route(web::get().to(get))
            .route(web::patch().to(update))
            .route(web::delete().to(delete)),
    );
}
