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

const COLUMNS: &str = "id, student_id, title, kind, url, grade, submitted_at";

#[derive(Debug, Serialize)]
pub struct PortfolioItemRow {
    pub id: String,
    pub student_id: String,
    pub title: String,
    pub kind: String,
    pub url: Option<String>,
    pub grade: Option<f64>,
    pub submitted_at: String,
}

fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<PortfolioItemRow> {
    Ok(PortfolioItemRow {
        id: row.get(0)?,
        student_id: row.get(1)?,
        title: row.get(2)?,
        kind: row.get(3)?,
        url: row.get(4)?,
        grade: row.get(5)?,
        submitted_at: row.get(6)?,
    })
}

fn fetch_item(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<Option<PortfolioItemRow>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {} FROM portfolio_items WHERE id = ?", COLUMNS),
        [id],
        row_to_item,
    )
    .optional()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListQuery {
    student_id: Option<String>,
    kind: Option<String>,
    title: Option<String>,
    submitted_from: Option<String>,
    submitted_to: Option<String>,
}

async fn list(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    let mut preds = Predicates::new();
    preds.eq("student_id", q.student_id);
    preds.eq("kind", q.kind);
    preds.like("title", q.title);
    preds.gte("submitted_at", q.submitted_from);
    preds.lte("submitted_at", q.submitted_to);

    let conn = state.conn()?;
    let sql = format!(
        "SELECT {} FROM portfolio_items{} ORDER BY submitted_at DESC",
        COLUMNS,
        preds.where_clause()
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| query_failed("portfolio.list", e))?;
    let rows = stmt
        .query_map(params_from_iter(preds.values()), row_to_item)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| query_failed("portfolio.list", e))?;
    Ok(HttpResponse::Ok().json(rows))
}

async fn get(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;
    match fetch_item(&conn, &id).map_err(|e| query_failed("portfolio.get", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("portfolio item not found")),
    }
}

#[derive(Debug, Deserialize)]
struct CreateBody {
    student_id: String,
    title: String,
    kind: String,
    url: Option<String>,
    grade: Option<f64>,
    submitted_at: Option<String>,
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
    let submitted_at = b.submitted_at.unwrap_or_else(|| Utc::now().to_rfc3339());
    let conn = state.conn()?;
    conn.execute(
        "INSERT INTO portfolio_items(id, student_id, title, kind, url, grade, submitted_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![id, b.student_id, title, b.kind, b.url, b.grade, submitted_at],
    )
    .map_err(|e| insert_failed("portfolio.create", e))?;

    match fetch_item(&conn, &id).map_err(|e| query_failed("portfolio.create", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("portfolio item not found")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateBody {
    title: Option<String>,
    kind: Option<String>,
    url: Option<String>,
    grade: Option<f64>,
    submitted_at: Option<String>,
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
    if let Some(v) = b.url {
        sets.push("url = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.grade {
        sets.push("grade = ?");
        values.push(Value::Real(v));
    }
    if let Some(v) = b.submitted_at {
        sets.push("submitted_at = ?");
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
                "UPDATE portfolio_items SET {} WHERE id = ?",
                sets.join(", ")
            ),
            params_from_iter(values.iter()),
        )
        .map_err(|e| update_failed("portfolio.update", e))?;
    if changed == 0 {
        return Err(ApiError::not_found("portfolio item not found"));
    }

    match fetch_item(&conn, &id).map_err(|e| query_failed("portfolio.update", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("portfolio item not found")),
    }
}

async fn delete(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;

    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM portfolio_items WHERE id = ?", [&id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(|e| query_failed("portfolio.delete", e))?;
    if exists.is_none() {
        return Err(ApiError::not_found("portfolio item not found"));
    }

    conn.execute("DELETE FROM portfolio_items WHERE id = ?", [&id])
        .map_err(|e| delete_failed("portfolio.delete", e))?;

    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/portfolio-items")
            .route(web::get().to(list))
            .route(web::post().to(create)),
    )
    .service(
        web::resource("/api/portfolio-items/{id}")
            .route(web::get().to(get))
            .route(web::patch().to(update))
            .route(web::delete().to(delete)),
    );
}
