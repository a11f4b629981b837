use actix_web::{web, HttpResponse};
use chrono::Utc;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::error::{
    delete_failed, insert_failed, query_failed, tx_failed, update_failed, ApiError,
};
use crate::api::types::AppState;
use crate::query::Predicates;

const COLUMNS: &str = "id, full_name, email, group_name, status, progress, enrolled_at";

#[derive(Debug, Serialize)]
pub struct StudentRow {
    pub id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub group_name: Option<String>,
    pub status: String,
    pub progress: f64,
    pub enrolled_at: String,
}

fn row_to_student(row: &rusqlite::Row<'_>) -> rusqlite::Result<StudentRow> {
    Ok(StudentRow {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        group_name: row.get(3)?,
        status: row.get(4)?,
        progress: row.get(5)?,
        enrolled_at: row.get(6)?,
    })
}

fn fetch_student(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<Option<StudentRow>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {} FROM students WHERE id = ?", COLUMNS),
        [id],
        row_to_student,
    )
    .optional()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListQuery {
    group: Option<String>,
    status: Option<String>,
    name: Option<String>,
    enrolled_from: Option<String>,
    enrolled_to: Option<String>,
}

async fn list(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    let mut preds = Predicates::new();
    preds.eq("group_name", q.group);
    preds.eq("status", q.status);
    preds.like("full_name", q.name);
    preds.gte("enrolled_at", q.enrolled_from);
    preds.lte("enrolled_at", q.enrolled_to);

    let conn = state.conn()?;
    let sql = format!(
        "SELECT {} FROM students{} ORDER BY full_name",
        COLUMNS,
        preds.where_clause()
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| query_failed("students.list", e))?;
    let rows = stmt
        .query_map(params_from_iter(preds.values()), row_to_student)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| query_failed("students.list", e))?;
    Ok(HttpResponse::Ok().json(rows))
}

async fn get(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;
    match fetch_student(&conn, &id).map_err(|e| query_failed("students.get", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("student not found")),
    }
}

#[derive(Debug, Deserialize)]
struct CreateBody {
    full_name: String,
    email: Option<String>,
    group_name: Option<String>,
    #[serde(default = "default_status")]
    status: String,
    #[serde(default)]
    progress: f64,
    enrolled_at: Option<String>,
}

fn default_status() -> String {
    "active".to_string()
}

async fn create(
    state: web::Data<AppState>,
    body: web::Json<CreateBody>,
) -> Result<HttpResponse, ApiError> {
    let b = body.into_inner();
    let full_name = b.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(ApiError::bad_params("full_name must not be empty"));
    }

    let id = Uuid::new_v4().to_string();
    let enrolled_at = b.enrolled_at.unwrap_or_else(|| Utc::now().to_rfc3339());
    let conn = state.conn()?;
    conn.execute(
        "INSERT INTO students(id, full_name, email, group_name, status, progress, enrolled_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![id, full_name, b.email, b.group_name, b.status, b.progress, enrolled_at],
    )
    .map_err(|e| insert_failed("students.create", e))?;

    match fetch_student(&conn, &id).map_err(|e| query_failed("students.create", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("student not found")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateBody {
    full_name: Option<String>,
    email: Option<String>,
    group_name: Option<String>,
    status: Option<String>,
    progress: Option<f64>,
    enrolled_at: Option<String>,
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
    if let Some(v) = b.full_name {
        let v = v.trim().to_string();
        if v.is_empty() {
            return Err(ApiError::bad_params("full_name must not be empty"));
        }
        sets.push("full_name = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.email {
        sets.push("email = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.group_name {
        sets.push("group_name = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.status {
        sets.push("status = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.progress {
        sets.push("progress = ?");
        values.push(Value::Real(v));
    }
    if let Some(v) = b.enrolled_at {
        sets.push("enrolled_at = ?");
        values.push(Value::Text(v));
    }
    if sets.is_empty() {
        return Err(ApiError::bad_params("empty patch"));
    }
    values.push(Value::Text(id.clone()));

    let conn = state.conn()?;
    let changed = conn
        .execute(
            &format!("UPDATE students SET {} WHERE id = ?", sets.join(", ")),
            params_from_iter(values.iter()),
        )
        .map_err(|e| update_failed("students.update", e))?;
    if changed == 0 {
        return Err(ApiError::not_found("student not found"));
    }

    match fetch_student(&conn, &id).map_err(|e| query_failed("students.update", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("student not found")),
    }
}

async fn delete(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;

    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM students WHERE id = ?", [&id], |r| r.get(0))
        .optional()
        .map_err(|e| query_failed("students.delete", e))?;
    if exists.is_none() {
        return Err(ApiError::not_found("student not found"));
    }

    // Dependent rows go first; the schema has no ON DELETE CASCADE.
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| tx_failed("students.delete", e))?;
    for sql in [
        "DELETE FROM portfolio_items WHERE student_id = ?",
        "DELETE FROM reflections WHERE student_id = ?",
        "DELETE FROM simulation_results WHERE student_id = ?",
        "DELETE FROM trajectories WHERE student_id = ?",
        "DELETE FROM students WHERE id = ?",
    ] {
        if let Err(e) = tx.execute(sql, [&id]) {
            let _ = tx.rollback();
            return Err(delete_failed("students.delete", e));
        }
    }
    tx.commit().map_err(|e| tx_failed("students.delete", e))?;

    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/students")
            .route(web::get().to(list))
            .route(web::post().to(create)),
    )
    .service(
        web::resource("/api/students/{id}")
            .route(web::get().to(get))
            .route(web::patch().to(update))
            .route(web::delete().to(delete)),
    );
}
