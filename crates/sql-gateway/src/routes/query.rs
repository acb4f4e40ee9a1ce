use actix_web::http::{header, Method};
use actix_web::{web, HttpRequest, HttpResponse};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::db::{ExecutionError, QueryExecutor, QueryResult};
use crate::error::{ErrorKind, GatewayError};
use crate::gate::GateDecision;
use crate::metrics::{DB_ERRORS, GATE_REJECTIONS, QUERY_LATENCY, QUERY_REQUESTS};
use crate::payload::{PayloadError, QueryPayload};
use crate::state::AppState;

/// ANY / and /query - Gate a statement and run it against a binding
///
/// Every method lands here so the route can answer preflight and produce
/// its own 405 with CORS headers attached.
pub async fn query(req: HttpRequest, body: web::Payload, state: web::Data<AppState>) -> HttpResponse {
    if req.method() == Method::OPTIONS {
        QUERY_REQUESTS.with_label_values(&["preflight"]).inc();
        return state.cors.preflight(&req);
    }

    match run(&req, body, &state).await {
        Ok(result) => {
            QUERY_REQUESTS.with_label_values(&["ok"]).inc();
            let mut builder = HttpResponse::Ok();
            state.cors.apply(&req, &mut builder);
            builder.json(result)
        }
        Err(err) => error_response(&req, &state, &err),
    }
}

async fn run(
    req: &HttpRequest,
    body: web::Payload,
    state: &AppState,
) -> Result<QueryResult, GatewayError> {
    if req.method() != state.config.execute_method {
        return Err(GatewayError::MethodNotAllowed(
            state.config.execute_method.to_string(),
        ));
    }

    if !is_json(req) {
        return Err(GatewayError::UnsupportedMediaType);
    }

    let body = read_body(body, state.config.max_body_bytes).await?;
    let payload = QueryPayload::from_slice(&body)?;

    let (binding, executor) = state
        .bindings
        .resolve(payload.target_binding.as_deref())?;
    let binding = binding.to_string();

    if let GateDecision::Rejected(violation) = state.config.gate.evaluate(&payload.statement) {
        GATE_REJECTIONS
            .with_label_values(&[violation.label()])
            .inc();
        tracing::warn!(
            binding = %binding,
            reason = violation.label(),
            "statement rejected by gate"
        );
        let message = state.config.gate.message(&violation);
        return Err(GatewayError::Forbidden { violation, message });
    }

    tracing::debug!(
        binding = %binding,
        params = payload.parameters.len(),
        "executing statement"
    );
    execute(executor, &binding, payload, state.config.query_timeout).await
}

/// Buffer the body, stopping once it grows past `limit` bytes.
async fn read_body(body: web::Payload, limit: usize) -> Result<web::Bytes, PayloadError> {
    match body.to_bytes_limited(limit).await {
        Ok(Ok(bytes)) => Ok(bytes),
        Ok(Err(_)) => Err(PayloadError::TooLarge(limit)),
        Err(e) => Err(PayloadError::Unreadable(e.to_string())),
    }
}

/// Run the unmodified statement text with its parameters on the blocking pool,
/// bounded by `deadline`.
async fn execute(
    executor: Arc<dyn QueryExecutor>,
    binding: &str,
    payload: QueryPayload,
    deadline: Duration,
) -> Result<QueryResult, GatewayError> {
    let QueryPayload {
        statement,
        parameters,
        ..
    } = payload;

    let start = Instant::now();
    let task = web::block(move || executor.execute(&statement, &parameters));
    let outcome = tokio::time::timeout(deadline, task).await;
    QUERY_LATENCY
        .with_label_values(&[binding])
        .observe(start.elapsed().as_secs_f64());

    let result = match outcome {
        Err(_) => Err(ExecutionError::Timeout(deadline)),
        Ok(Err(blocking)) => return Err(GatewayError::Internal(blocking.to_string())),
        Ok(Ok(result)) => result,
    };

    result.map_err(|e| {
        let transient = if e.is_transient() { "true" } else { "false" };
        DB_ERRORS.with_label_values(&[binding, transient]).inc();
        GatewayError::Execution(e)
    })
}

/// `Content-Type` essence must be `application/json`; parameters are ignored.
fn is_json(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

/// Built by hand rather than through `ResponseError` since the CORS headers depend on the request.
fn error_response(req: &HttpRequest, state: &AppState, err: &GatewayError) -> HttpResponse {
    let kind = err.kind();
    match kind {
        ErrorKind::Execution | ErrorKind::Unexpected => {
            tracing::error!(kind = kind.label(), error = %err, "query failed")
        }
        _ => tracing::debug!(kind = kind.label(), error = %err, "request rejected"),
    }
    QUERY_REQUESTS.with_label_values(&[kind.label()]).inc();

    let mut builder = HttpResponse::build(err.status());
    state.cors.apply(req, &mut builder);
    if kind == ErrorKind::MethodNotAllowed {
        builder.insert_header((header::ALLOW, state.cors.allow_methods()));
    }
    builder.json(err.body())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/").route(web::route().to(query)))
        .service(web::resource("/query").route(web::route().to(query)));
}
