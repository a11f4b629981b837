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

const COLUMNS: &str = "id, student_id, module_id, body, mood, created_at";

#[derive(Debug, Serialize)]
pub struct ReflectionRow {
    pub id: String,
    pub student_id: String,
    pub module_id: Option<String>,
    pub body: String,
    pub mood: Option<String>,
    pub created_at: String,
}

fn row_to_reflection(row: &rusqlite::Row<'_>) -> rusqlite::Result<ReflectionRow> {
    Ok(ReflectionRow {
        id: row.get(0)?,
        student_id: row.get(1)?,
        module_id: row.get(2)?,
        body: row.get(3)?,
        mood: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn fetch_reflection(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<Option<ReflectionRow>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {} FROM reflections WHERE id = ?", COLUMNS),
        [id],
        row_to_reflection,
    )
    .optional()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListQuery {
    student_id: Option<String>,
    module_id: Option<String>,
    search: Option<String>,
    created_from: Option<String>,
    created_to: Option<String>,
}

async fn list(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    let mut preds = Predicates::new();
    preds.eq("student_id", q.student_id);
    preds.eq("module_id", q.module_id);
    preds.like("body", q.search);
    preds.gte("created_at", q.created_from);
    preds.lte("created_at", q.created_to);

    let conn = state.conn()?;
    let sql = format!(
        "SELECT {} FROM reflections{} ORDER BY created_at DESC",
        COLUMNS,
        preds.where_clause()
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| query_failed("reflections.list", e))?;
    let rows = stmt
        .query_map(params_from_iter(preds.values()), row_to_reflection)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| query_failed("reflections.list", e))?;
    Ok(HttpResponse::Ok().json(rows))
}

async fn get(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;
    match fetch_reflection(&conn, &id).map_err(|e| query_failed("reflections.get", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("reflection not found")),
    }
}

#[derive(Debug, Deserialize)]
struct CreateBody {
    student_id: String,
    module_id: Option<String>,
    body: String,
    mood: Option<String>,
}

async fn create(
    state: web::Data<AppState>,
    body: web::Json<CreateBody>,
) -> Result<HttpResponse, ApiError> {
    let b = body.into_inner();
    let text = b.body.trim().to_string();
    if text.is_empty() {
        return Err(ApiError::bad_params("body must not be empty"));
    }

    let id = Uuid::new_v4().to_string();
    let created_at = Utc::now().to_rfc3339();
    let conn = state.conn()?;
    conn.execute(
        "INSERT INTO reflections(id, student_id, module_id, body, mood, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![id, b.student_id, b.module_id, text, b.mood, created_at],
    )
    .map_err(|e| insert_failed("reflections.create", e))?;

    match fetch_reflection(&conn, &id).map_err(|e| query_failed("reflections.create", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("reflection not found")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateBody {
    body: Option<String>,
    mood: Option<String>,
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
    if let Some(v) = b.body {
        let v = v.trim().to_string();
        if v.is_empty() {
            return Err(ApiError::bad_params("body must not be empty"));
        }
        sets.push("body = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.mood {
        sets.push("mood = ?");
        values.push(Value::Text(v));
    }
    if sets.is_empty() {
        return Err(ApiError::bad_params("empty patch"));
    }
    values.push(Value::Text(id.clone()));

    let conn = state.conn()?;
    let changed = conn
        .execute(
            &format!("UPDATE reflections SET {} WHERE id = ?", sets.join(", ")),
            params_from_iter(values.iter()),
        )
        .map_err(|e| update_failed("reflections.update", e))?;
    if changed == 0 {
        return Err(ApiError::not_found("reflection not found"));
    }

    match fetch_reflection(&conn, &id).map_err(|e| query_failed("reflections.update", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("reflection not found")),
    }
}

async fn delete(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;

    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM reflections WHERE id = ?", [&id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(|e| query_failed("reflections.delete", e))?;
    if exists.is_none() {
        return Err(ApiError::not_found("reflection not found"));
    }

    conn.execute("DELETE FROM reflections WHERE id = ?", [&id])
        .map_err(|e| delete_failed("reflections.delete", e))?;

    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/reflections")
            .route(web::get().to(list))
            .route(web::post().to(create)),
    )
    .service(
        web::resource("/api/reflections/{id}")
            .route(web::get().to(get))
            .route(web::patch().to(update))
            .route(web::delete().to(delete)),
    );
}
