use actix_web::{web, HttpResponse};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::api::error::{delete_failed, insert_failed, query_failed, update_failed, ApiError};
use crate::api::types::AppState;
use crate::query::Predicates;

const COLUMNS: &str = "id, full_name, email, department, title, active";

#[derive(Debug, Serialize)]
pub struct FacilitatorRow {
    pub id: String,
    pub full_name: String,
    pub email: Option<String>,
    pub department: Option<String>,
    pub title: Option<String>,
    pub active: bool,
}

fn row_to_facilitator(row: &rusqlite::Row<'_>) -> rusqlite::Result<FacilitatorRow> {
    Ok(FacilitatorRow {
        id: row.get(0)?,
        full_name: row.get(1)?,
        email: row.get(2)?,
        department: row.get(3)?,
        title: row.get(4)?,
        active: row.get::<_, i64>(5)? != 0,
    })
}

fn fetch_facilitator(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<Option<FacilitatorRow>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {} FROM facilitators WHERE id = ?", COLUMNS),
        [id],
        row_to_facilitator,
    )
    .optional()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListQuery {
    department: Option<String>,
    active: Option<bool>,
    name: Option<String>,
}

async fn list(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    let mut preds = Predicates::new();
    preds.eq("department", q.department);
    preds.eq("active", q.active.map(|b| Value::Integer(i64::from(b))));
    preds.like("full_name", q.name);

    let conn = state.conn()?;
    let sql = format!(
        "SELECT {} FROM facilitators{} ORDER BY full_name",
        COLUMNS,
        preds.where_clause()
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| query_failed("facilitators.list", e))?;
    let rows = stmt
        .query_map(params_from_iter(preds.values()), row_to_facilitator)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| query_failed("facilitators.list", e))?;
    Ok(HttpResponse::Ok().json(rows))
}

async fn get(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;
    match fetch_facilitator(&conn, &id).map_err(|e| query_failed("facilitators.get", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("facilitator not found")),
    }
}

#[derive(Debug, Deserialize)]
struct CreateBody {
    full_name: String,
    email: Option<String>,
    department: Option<String>,
    title: Option<String>,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_active() -> bool {
    true
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
    let conn = state.conn()?;
    conn.execute(
        "INSERT INTO facilitators(id, full_name, email, department, title, active)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![id, full_name, b.email, b.department, b.title, b.active],
    )
    .map_err(|e| insert_failed("facilitators.create", e))?;

    match fetch_facilitator(&conn, &id).map_err(|e| query_failed("facilitators.create", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("facilitator not found")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateBody {
    full_name: Option<String>,
    email: Option<String>,
    department: Option<String>,
    title: Option<String>,
    active: Option<bool>,
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
    if let Some(v) = b.department {
        sets.push("department = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.title {
        sets.push("title = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.active {
        sets.push("active = ?");
        values.push(Value::Integer(i64::from(v)));
    }
    if sets.is_empty() {
        return Err(ApiError::bad_params("empty patch"));
    }
    values.push(Value::Text(id.clone()));

    let conn = state.conn()?;
    let changed = conn
        .execute(
            &format!("UPDATE facilitators SET {} WHERE id = ?", sets.join(", ")),
            params_from_iter(values.iter()),
        )
        .map_err(|e| update_failed("facilitators.update", e))?;
    if changed == 0 {
        return Err(ApiError::not_found("facilitator not found"));
    }

    match fetch_facilitator(&conn, &id).map_err(|e| query_failed("facilitators.update", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("facilitator not found")),
    }
}

async fn delete(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;

    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM facilitators WHERE id = ?", [&id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(|e| query_failed("facilitators.delete", e))?;
    if exists.is_none() {
        return Err(ApiError::not_found("facilitator not found"));
    }

    conn.execute("DELETE FROM facilitators WHERE id = ?", [&id])
        .map_err(|e| delete_failed("facilitators.delete", e))?;

    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/facilitators")
            .route(web::get().to(list))
            .route(web::post().to(create)),
    )
    .service(
        web::resource("/api/facilitators/{id}")
            .route(web::get().to(get))
            .route(web::patch().to(update))
            .route(web::delete().to(delete)),
    );
}
