use actix_web::{get, web, HttpResponse};

use crate::app_state::AppState;

#[get("/health")]
pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Readiness includes the store. States built without a database (tests,
/// in-memory wiring) report ready.
#[get("/health/ready")]
pub async fn health_check_ready(state: web::Data<AppState>) -> HttpResponse {
    let mongodb_ok = match &state.db {
        Some(db) => match db.health_check().await {
            Ok(()) => true,
            Err(err) => {
                log::warn!("Readiness probe failed: {}", err);
                false
            }
        },
        None => true,
    };

    let response = serde_json::json!({
        "status": if mongodb_ok { "ready" } else { "not_ready" },
        "version": env!("CARGO_PKG_VERSION"),
        "dependencies": {
            "mongodb": if mongodb_ok { "ok" } else { "error" }
        }
    });

    if mongodb_ok {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
