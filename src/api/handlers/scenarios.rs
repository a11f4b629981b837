use actix_web::{web, HttpResponse};
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

const COLUMNS: &str = "id, title, description, category, difficulty, duration_minutes, active";

#[derive(Debug, Serialize)]
pub struct ScenarioRow {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub difficulty: i64,
    pub duration_minutes: i64,
    pub active: bool,
}

fn row_to_scenario(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScenarioRow> {
    Ok(ScenarioRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        category: row.get(3)?,
        difficulty: row.get(4)?,
        duration_minutes: row.get(5)?,
        active: row.get::<_, i64>(6)? != 0,
    })
}

fn fetch_scenario(
    conn: &rusqlite::Connection,
    id: &str,
) -> Result<Option<ScenarioRow>, rusqlite::Error> {
    conn.query_row(
        &format!("SELECT {} FROM simulation_scenarios WHERE id = ?", COLUMNS),
        [id],
        row_to_scenario,
    )
    .optional()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ListQuery {
    category: Option<String>,
    difficulty: Option<i64>,
    active: Option<bool>,
    title: Option<String>,
}

async fn list(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, ApiError> {
    let q = query.into_inner();
    let mut preds = Predicates::new();
    preds.eq("category", q.category);
    preds.eq("difficulty", q.difficulty);
    preds.eq("active", q.active.map(|b| Value::Integer(i64::from(b))));
    preds.like("title", q.title);

    let conn = state.conn()?;
    let sql = format!(
        "SELECT {} FROM simulation_scenarios{} ORDER BY title",
        COLUMNS,
        preds.where_clause()
    );
    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| query_failed("scenarios.list", e))?;
    let rows = stmt
        .query_map(params_from_iter(preds.values()), row_to_scenario)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(|e| query_failed("scenarios.list", e))?;
    Ok(HttpResponse::Ok().json(rows))
}

async fn get(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;
    match fetch_scenario(&conn, &id).map_err(|e| query_failed("scenarios.get", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("scenario not found")),
    }
}

#[derive(Debug, Deserialize)]
struct CreateBody {
    title: String,
    description: Option<String>,
    category: Option<String>,
    #[serde(default = "default_difficulty")]
    difficulty: i64,
    #[serde(default)]
    duration_minutes: i64,
    #[serde(default = "default_active")]
    active: bool,
}

fn default_difficulty() -> i64 {
    1
}

fn default_active() -> bool {
    true
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
        "INSERT INTO simulation_scenarios(id, title, description, category, difficulty,
                                          duration_minutes, active)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        params![
            id,
            title,
            b.description,
            b.category,
            b.difficulty,
            b.duration_minutes,
            b.active
        ],
    )
    .map_err(|e| insert_failed("scenarios.create", e))?;

    match fetch_scenario(&conn, &id).map_err(|e| query_failed("scenarios.create", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("scenario not found")),
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct UpdateBody {
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    difficulty: Option<i64>,
    duration_minutes: Option<i64>,
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
    if let Some(v) = b.category {
        sets.push("category = ?");
        values.push(Value::Text(v));
    }
    if let Some(v) = b.difficulty {
        sets.push("difficulty = ?");
        values.push(Value::Integer(v));
    }
    if let Some(v) = b.duration_minutes {
        sets.push("duration_minutes = ?");
        values.push(Value::Integer(v));
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
            &format!(
                "UPDATE simulation_scenarios SET {} WHERE id = ?",
                sets.join(", ")
            ),
            params_from_iter(values.iter()),
        )
        .map_err(|e| update_failed("scenarios.update", e))?;
    if changed == 0 {
        return Err(ApiError::not_found("scenario not found"));
    }

    match fetch_scenario(&conn, &id).map_err(|e| query_failed("scenarios.update", e))? {
        Some(row) => Ok(HttpResponse::Ok().json(row)),
        None => Err(ApiError::not_found("scenario not found")),
    }
}

async fn delete(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let conn = state.conn()?;

    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM simulation_scenarios WHERE id = ?",
            [&id],
            |r| r.get(0),
        )
        .optional()
        .map_err(|e| query_failed("scenarios.delete", e))?;
    if exists.is_none() {
        return Err(ApiError::not_found("scenario not found"));
    }

    let tx = conn
        .unchecked_transaction()
        .map_err(|e| tx_failed("scenarios.delete", e))?;
    for sql in [
        "DELETE FROM simulation_results WHERE scenario_id = ?",
        "DELETE FROM simulation_scenarios WHERE id = ?",
    ] {
        if let Err(e) = tx.execute(sql, [&id]) {
            let _ = tx.rollback();
            return Err(delete_failed("scenarios.delete", e));
        }
    }
    tx.commit().map_err(|e| tx_failed("scenarios.delete", e))?;

    Ok(HttpResponse::Ok().json(json!({ "deleted": true })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/simulation-scenarios")
            .route(web::get().to(list))
            .route(web::post().to(create)),
    )
    .service(
        web::resource("/api/simulation-scenarios/{id}")
            .route(web::get().to(get))
            .route(web::patch().to(update))
            .route(web::delete().to(delete)),
    );
}
