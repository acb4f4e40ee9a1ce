use actix_web::{web, HttpRequest, HttpResponse};

use crate::metrics::metrics_output;
use crate::security::constant_time_eq;
use crate::state::AppState;

/// GET /health - Health check endpoint
///
/// Probes every binding with `SELECT 1`; any failure reports `degraded`.
pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let mut bindings = serde_json::Map::new();
    let mut degraded = false;

    for name in state.bindings.names() {
        let executor = match state.bindings.get(name) {
            Some(executor) => executor,
            None => continue,
        };
        let probe = web::block(move || executor.execute("SELECT 1", &[])).await;
        let status = match probe {
            Ok(Ok(_)) => "ok",
            Ok(Err(e)) => {
                tracing::warn!(binding = %name, error = %e, "health probe failed");
                degraded = true;
                "degraded"
            }
            Err(e) => {
                tracing::warn!(binding = %name, error = %e, "health probe did not run");
                degraded = true;
                "degraded"
            }
        };
        bindings.insert(name.to_string(), serde_json::json!(status));
    }

    let response = serde_json::json!({
        "status": if degraded { "degraded" } else { "ok" },
        "service": "sql-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "defaultBinding": state.bindings.default_name(),
        "multipleBindings": state.bindings.supports_multiple(),
        "bindings": bindings,
    });

    if degraded {
        HttpResponse::ServiceUnavailable().json(response)
    } else {
        HttpResponse::Ok().json(response)
    }
}

/// GET /metrics - Prometheus metrics endpoint (optionally auth-gated)
pub async fn metrics(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    // Check bearer token if METRICS_TOKEN is configured
    if let Some(ref expected_token) = state.config.metrics_token {
        let authorized = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(|token| constant_time_eq(token.as_bytes(), expected_token.as_bytes()))
            .unwrap_or(false);

        if !authorized {
            return HttpResponse::Unauthorized().json(serde_json::json!({
                "error": "unauthorized",
                "message": "Valid Bearer token required for /metrics"
            }));
        }
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(metrics_output())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/metrics", web::get().to(metrics));
}
