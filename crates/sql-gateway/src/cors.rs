//! CORS headers for the query route.
//!
//! The gateway answers preflight itself and stamps `Access-Control-Allow-Origin`
//! onto every response it produces, errors included.

use actix_web::http::header::{self, HeaderValue};
use actix_web::{HttpRequest, HttpResponse, HttpResponseBuilder};

use crate::config::GatewayConfig;

#[derive(Debug, Clone)]
pub struct CorsPolicy {
    origins: Vec<String>,
    allow_headers: String,
    allow_methods: String,
    max_age: u32,
}

impl CorsPolicy {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            origins: config.allowed_origins.clone(),
            allow_headers: config.allowed_headers.join(", "),
            allow_methods: format!("{}, OPTIONS", config.execute_method),
            max_age: config.cors_max_age,
        }
    }

    /// Value for the `Allow` / `Access-Control-Allow-Methods` headers.
    pub fn allow_methods(&self) -> &str {
        &self.allow_methods
    }

    fn is_wildcard(&self) -> bool {
        self.origins.iter().any(|o| o == "*")
    }

    /// The `Access-Control-Allow-Origin` value for a request, if any.
    pub fn allow_origin(&self, req: &HttpRequest) -> Option<String> {
        if self.is_wildcard() {
            return Some("*".to_string());
        }
        let origin = req.headers().get(header::ORIGIN)?.to_str().ok()?;
        self.origins
            .iter()
            .find(|allowed| allowed.as_str() == origin)
            .cloned()
    }

    /// Attach the per-response CORS headers.
    pub fn apply(&self, req: &HttpRequest, builder: &mut HttpResponseBuilder) {
        if let Some(origin) = self.allow_origin(req) {
            builder.insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, origin));
        }
        if !self.is_wildcard() {
            builder.insert_header((header::VARY, HeaderValue::from_static("Origin")));
        }
    }

    /// Answer an `OPTIONS` request. Never touches a database.
    pub fn preflight(&self, req: &HttpRequest) -> HttpResponse {
        let mut builder = HttpResponse::NoContent();
        self.apply(req, &mut builder);
        builder
            .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, self.allow_headers.as_str()))
            .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, self.allow_methods.as_str()))
            .insert_header((header::ACCESS_CONTROL_MAX_AGE, self.max_age.to_string()))
            .insert_header((header::ALLOW, self.allow_methods.as_str()))
            .finish()
    }
}
