use axum::Json;
use serde_json::{json, Value};

const SERVICE: &str = "resume-analyzer";

/// GET /health
/// Returns a simple status object with service version.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": SERVICE
    }))
}

/// GET /
pub async fn service_info() -> Json<Value> {
    Json(json!({
        "service": SERVICE,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "analyze": "POST /api/v1/analyze (multipart field 'file': PDF, DOCX or TXT)",
            "health": "GET /health"
        }
    }))
}
