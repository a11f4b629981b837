use actix_web::{web, HttpResponse};
use serde_json::json;

use crate::ai::{self, GenerationRequest};
use crate::api::types::AppState;

/// All failure modes collapse to one generic body; the cause only goes to the
/// log.
async fn generate_content(
    state: web::Data<AppState>,
    body: web::Json<GenerationRequest>,
) -> HttpResponse {
    let req = body.into_inner();
    match ai::generate(&state.ai, &req).await {
        Ok(payload) => HttpResponse::Ok().json(payload),
        Err(e) => {
            tracing::error!(error = %e, "content generation failed");
            HttpResponse::InternalServerError()
                .json(json!({ "error": "Failed to generate content" }))
        }
    }
}

async fn method_not_allowed() -> HttpResponse {
    HttpResponse::MethodNotAllowed().json(json!({
        "error": { "code": "method_not_allowed", "message": "use POST" }
    }))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/generate-content")
            .route(web::post().to(generate_content))
            .default_service(web::route().to(method_not_allowed)),
    );
}
