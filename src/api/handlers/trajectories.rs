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

const COLUMNS: &str = "id, student_id, title, target_role, progress, status, updated_at";

#[derive(Debug, Serialize)]
pub struct TrajectoryRow {
    pub id: String,
    pub student_id: String,
    pub title: String,
    pub target_role: Option<String>,
    pub progress: f64,
    pub status: String,
    pub updated_at: String,
}

fn row_to_trajectory(row: &rusqlite::Row<'_>) -> rusqlite::Result<TrajectoryRow> {
    Ok(TrajectoryRow {
        id: row.get(0)?,
        student_id: row.get(1)?,
        title: row.get(2)?,
        target_role: row.get(3)?,
        progress: row.get(4)?,
        status: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn fetch_trajectory(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<Option<TrajectoryRow>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {} FROM trajectories WHERE id = ?", COLUMNS),
        [id],
        row_to_trajectory,
    )
    .optional()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListQuery {
    student_id: Option<String>,
    status: Option<String>,
    title: Option<String>,
}

async fn list(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    let mut preds = Predicates::new();
    preds.eq("student_id", q.student_id);
    preds.eq("status", q.status);
    preds.like("title", q.title);

    let conn = state.conn()?;
    let sql = format!(
        "SELECT {} FROM trajectories{} ORDER BY updated_at DESC",
        COLUMNS,
        preds.where_clause()
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| query_failed("trajectories.list", e))?;
    let rows = stmt
        .query_map(params_from_iter(preds.values()), row_to_trajectory)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| query_failed("trajectories.list", e))?;
    Ok(HttpResponse::Ok().json(rows))
}

async fn get(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;
    match fetch_trajectory(&conn, &id).map_err(|e| query_failed("trajectories.get", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("trajectory not found")),
    }
}

#[derive(Debug, Deserialize)]
struct CreateBody {
    student_id: String,
    title: String,
    target_role: Option<String>,
    #[serde(default)]
    progress: f64,
    #[serde(default = "default_trajectory_status")]
    status: String,
}

fn default_trajectory_status() -> String {
    "draft".to_string()
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
    let updated_at = Utc::now().to_rfc3339();
    let conn = state.conn()?;
    conn.execute(
        "INSERT INTO trajectories(id, student_id, title, target_role, progress, status, updated_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            b.student_id,
            title,
            b.target_role,
            b.progress,
            b.status,
            updated_at
        ],
    )
    .map_err(|e| insert_failed("trajectories.create", e))?;

    match fetch_trajectory(&conn, &id).map_err(|e| query_failed("trajectories.create", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("trajectory not found")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateBody {
    title: Option<String>,
    target_role: Option<String>,
    progress: Option<f64>,
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
    if let Some(v) = b.target_role {
        sets.push("target_role = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.progress {
        sets.push("progress = ?");
        values.push(Value::Real(v));
    }
    if let Some(v) = b.status {
        sets.push("status = ?");
        values.push(Value::Text(v));
    }
    if sets.is_empty() {
        return Err(ApiError::bad_params("empty patch"));
    }
    // Every successful patch bumps the freshness column the list sorts on.
    sets.push("updated_at = ?");
    values.push(Value::Text(Utc::now().to_rfc3339()));
    values.push(Value::Text(id.clone()));

    let conn = state.conn()?;
    let changed = conn
        .execute(
            &format!("UPDATE trajectories SET {} WHERE id = ?", sets.join(", ")),
            params_from_iter(values.iter()),
        )
        .map_err(|e| update_failed("trajectories.update", e))?;
    if changed == 0 {
        return Err(ApiError::not_found("trajectory not found"));
    }

    match fetch_trajectory(&conn, &id).map_err(|e| query_failed("trajectories.update", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("trajectory not found")),
    }
}

async fn delete(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;

    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM trajectories WHERE id = ?", [&id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(|e| query_failed("trajectories.delete", e))?;
    if exists.is_none() {
        return Err(ApiError::not_found("trajectory not found"));
    }

    conn.execute("DELETE FROM trajectories WHERE id = ?", [&id])
        .map_err(|e| delete_failed("trajectories.delete", e))?;

    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/trajectories")
            .route(web::get().to(list))
            .route(web::post().to(create)),
    )
    .service(
        web::resource("/api/trajectories/{id}")
            .route(web::get().to(get))
            .route(web::patch().to(update))
            .route(web::delete().to(delete)),
    );
}
