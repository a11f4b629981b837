use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::api::error::{query_failed, ApiError};
use crate::api::types::AppState;

async fn health(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let conn = state.conn()?;
    conn.query_row("SELECT 1", [], |r| r.get::<_, i64>(0))
        .map_err(|e| query_failed("health", e))?;
    Ok(HttpResponse::Ok().json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "database": "ok"
    })))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/api/health").route(web::get().to(health)));
}
