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

const COLUMNS: &str =
    "id, title, description, language, complexity, estimated_load, status, sort_order, created_at";

#[derive(Debug, Serialize)]
pub struct ModuleRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub language: String,
    pub complexity: String,
    pub estimated_load: i64,
    pub status: String,
    pub sort_order: i64,
    pub created_at: String,
}

fn row_to_module(row: &rusqlite::Row<'_>) -> rusqlite::Result<ModuleRow> {
    Ok(ModuleRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        language: row.get(3)?,
        complexity: row.get(4)?,
        estimated_load: row.get(5)?,
        status: row.get(6)?,
        sort_order: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn fetch_module(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<Option<ModuleRow>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {} FROM learning_modules WHERE id = ?", COLUMNS),
        [id],
        row_to_module,
    )
    .optional()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListQuery {
    status: Option<String>,
    complexity: Option<String>,
    language: Option<String>,
    title: Option<String>,
    load_min: Option<i64>,
    load_max: Option<i64>,
}

async fn list(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    let mut preds = Predicates::new();
    preds.eq("status", q.status);
    preds.eq("complexity", q.complexity);
    preds.eq("language", q.language);
    preds.like("title", q.title);
    preds.gte("estimated_load", q.load_min);
    preds.lte("estimated_load", q.load_max);

    let conn = state.conn()?;
    let sql = format!(
        "SELECT {} FROM learning_modules{} ORDER BY sort_order, title",
        COLUMNS,
        preds.where_clause()
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| query_failed("modules.list", e))?;
    let rows = stmt
        .query_map(params_from_iter(preds.values()), row_to_module)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| query_failed("modules.list", e))?;
    Ok(HttpResponse::Ok().json(rows))
}

async fn get(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;
    match fetch_module(&conn, &id).map_err(|e| query_failed("modules.get", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("learning module not found")),
    }
}

#[derive(Debug, Deserialize)]
struct CreateBody {
    title: String,
    description: Option<String>,
    #[serde(default = "default_language")]
    language: String,
    #[serde(default = "default_complexity")]
    complexity: String,
    #[serde(default)]
    estimated_load: i64,
    #[serde(default = "default_module_status")]
    status: String,
    #[serde(default)]
    sort_order: i64,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_complexity() -> String {
    "basic".to_string()
}

fn default_module_status() -> String {
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
    let created_at = Utc::now().to_rfc3339();
    let conn = state.conn()?;
    conn.execute(
        "INSERT INTO learning_modules(id, title, description, language, complexity,
                                      estimated_load, status, sort_order, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            title,
            b.description,
            b.language,
            b.complexity,
            b.estimated_load,
            b.status,
            b.sort_order,
            created_at
        ],
    )
    .map_err(|e| insert_failed("modules.create", e))?;

    match fetch_module(&conn, &id).map_err(|e| query_failed("modules.create", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("learning module not found")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateBody {
    title: Option<String>,
    description: Option<String>,
    language: Option<String>,
    complexity: Option<String>,
    estimated_load: Option<i64>,
    status: Option<String>,
    sort_order: Option<i64>,
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
    if let Some(v) = b.description {
        sets.push("description = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.language {
        sets.push("language = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.complexity {
        sets.push("complexity = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.estimated_load {
        sets.push("estimated_load = ?");
        values.push(Value::Integer(v));
    }
    if let Some(v) = b.status {
        sets.push("status = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.sort_order {
        sets.push("sort_order = ?");
        values.push(Value::Integer(v));
    }
    if sets.is_empty() {
        return Err(ApiError::bad_params("empty patch"));
    }
    values.push(Value::Text(id.clone()));

    let conn = state.conn()?;
    let changed = conn
        .execute(
            &format!(
                "UPDATE learning_modules SET {} WHERE id = ?",
                sets.join(", ")
            ),
            params_from_iter(values.iter()),
        )
        .map_err(|e| update_failed("modules.update", e))?;
    if changed == 0 {
        return Err(ApiError::not_found("learning module not found"));
    }

    match fetch_module(&conn, &id).map_err(|e| query_failed("modules.update", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("learning module not found")),
    }
}

async fn delete(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;

    let exists: Option<i64> = conn
        .query_row("SELECT 1 FROM learning_modules WHERE id = ?", [&id], |r| {
            r.get(0)
        })
        .optional()
        .map_err(|e| query_failed("modules.delete", e))?;
    if exists.is_none() {
        return Err(ApiError::not_found("learning module not found"));
    }

    // Reflections keep their row but lose the module link; assessments go.
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| tx_failed("modules.delete", e))?;
    for sql in [
        "UPDATE reflections SET module_id = NULL WHERE module_id = ?",
        "DELETE FROM assessments WHERE module_id = ?",
        "DELETE FROM learning_modules WHERE id = ?",
    ] {
        if let Err(e) = tx.execute(sql, [&id]) {
            let _ = tx.rollback();
            return Err(delete_failed("modules.delete", e));
        }
    }
    tx.commit().map_err(|e| tx_failed("modules.delete", e))?;

    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/learning-modules")
            .route(web::get().to(list))
            .route(web::post().to(create)),
    )
    .service(
        web::resource("/api/learning-modules/{id}")
            .route(web::get().to(get))
            .route(web::patch().to(update))
            .route(web::delete().to(delete)),
    );
}
