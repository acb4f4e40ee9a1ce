use actix_web::http::Method;
use std::env;
use std::time::Duration;

use crate::gate::{DenyMatch, GatePolicy};

const DEFAULT_PORT: u16 = 8787;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
const DEFAULT_DB_PATH: &str = "./gateway.db";
const DEFAULT_BINDING_NAME: &str = "DB";
const DEFAULT_ALLOWED_VERBS: &str = "select,insert,update,explain";
const DEFAULT_DENIED_KEYWORDS: &str = "delete,drop,truncate,alter";
const DEFAULT_ALLOWED_HEADERS: &str = "Content-Type, Authorization";
const DEFAULT_CORS_MAX_AGE: u32 = 86_400;
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RATE_LIMIT_RPM: u32 = 120;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Immutable gateway configuration, built once at startup.
#[derive(Clone)]
pub struct GatewayConfig {
    /// Server port
    pub port: u16,
    /// Interface to bind
    pub bind_addr: String,
    /// The only method that may submit statements
    pub execute_method: Method,
    /// CORS origins; `*` allows any
    pub allowed_origins: Vec<String>,
    /// Headers advertised on preflight
    pub allowed_headers: Vec<String>,
    /// Preflight cache lifetime in seconds
    pub cors_max_age: u32,
    /// Statement allow-list / deny-list
    pub gate: GatePolicy,
    /// (binding name, SQLite path) pairs
    pub databases: Vec<(String, String)>,
    /// Binding used when the request names none
    pub default_binding: String,
    /// Whether clients may pick a binding with `targetBinding`
    pub supports_multiple_bindings: bool,
    /// Upper bound on a single statement's execution
    pub query_timeout: Duration,
    /// Rate limit requests per minute
    pub rate_limit_rpm: u32,
    /// Request body size cap
    pub max_body_bytes: usize,
    /// Bearer token required for /metrics (None = public)
    pub metrics_token: Option<String>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field("bind_addr", &self.bind_addr)
            .field("execute_method", &self.execute_method)
            .field("allowed_origins", &self.allowed_origins)
            .field("allowed_headers", &self.allowed_headers)
            .field("cors_max_age", &self.cors_max_age)
            .field("gate", &self.gate)
            .field("databases", &self.databases)
            .field("default_binding", &self.default_binding)
            .field(
                "supports_multiple_bindings",
                &self.supports_multiple_bindings,
            )
            .field("query_timeout", &self.query_timeout)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field("max_body_bytes", &self.max_body_bytes)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind_addr: DEFAULT_BIND_ADDR.to_string(),
            execute_method: Method::POST,
            allowed_origins: vec!["*".to_string()],
            allowed_headers: split_list(DEFAULT_ALLOWED_HEADERS),
            cors_max_age: DEFAULT_CORS_MAX_AGE,
            gate: GatePolicy::new(
                split_list(DEFAULT_ALLOWED_VERBS),
                split_list(DEFAULT_DENIED_KEYWORDS),
                DenyMatch::default(),
            ),
            databases: vec![(
                DEFAULT_BINDING_NAME.to_string(),
                DEFAULT_DB_PATH.to_string(),
            )],
            default_binding: DEFAULT_BINDING_NAME.to_string(),
            supports_multiple_bindings: false,
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
            rate_limit_rpm: DEFAULT_RATE_LIMIT_RPM,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            metrics_token: None,
        }
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key lookup (the process environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|s| !s.trim().is_empty());

        // Optional: port
        let port = match var("PORT") {
            Some(s) => s
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::invalid("PORT", &s))?,
            None => DEFAULT_PORT,
        };

        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        // Optional: execute method
        let execute_method = match var("EXECUTE_METHOD") {
            Some(s) => parse_execute_method(&s)?,
            None => Method::POST,
        };

        // Optional: CORS
        let allowed_origins = split_list(&var("ALLOWED_ORIGINS").unwrap_or_else(|| "*".to_string()));
        let allowed_headers =
            split_list(&var("ALLOWED_HEADERS").unwrap_or_else(|| DEFAULT_ALLOWED_HEADERS.to_string()));
        let cors_max_age = match var("CORS_MAX_AGE") {
            Some(s) => s
                .trim()
                .parse::<u32>()
                .map_err(|_| ConfigError::invalid("CORS_MAX_AGE", &s))?,
            None => DEFAULT_CORS_MAX_AGE,
        };

        // Statement gating. DENIED_KEYWORDS may be set to an empty value to disable the deny-list.
        let allowed_verbs =
            split_list(&var("ALLOWED_VERBS").unwrap_or_else(|| DEFAULT_ALLOWED_VERBS.to_string()));
        if allowed_verbs.is_empty() {
            return Err(ConfigError::invalid("ALLOWED_VERBS", ""));
        }
        let denied_keywords = split_list(
            &lookup("DENIED_KEYWORDS").unwrap_or_else(|| DEFAULT_DENIED_KEYWORDS.to_string()),
        );
        let deny_match = match var("DENY_MATCH") {
            Some(s) => s
                .parse::<DenyMatch>()
                .map_err(|_| ConfigError::invalid("DENY_MATCH", &s))?,
            None => DenyMatch::default(),
        };
        let gate = GatePolicy::new(allowed_verbs, denied_keywords, deny_match);

        // Database bindings
        let (databases, listed) = match var("DATABASES") {
            Some(s) => (parse_databases(&s)?, true),
            None => {
                let name = var("BINDING_NAME").unwrap_or_else(|| DEFAULT_BINDING_NAME.to_string());
                let path = var("DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string());
                (vec![(name, path)], false)
            }
        };
        let supports_multiple_bindings = match var("MULTI_BINDING") {
            Some(s) => parse_bool(&s).ok_or_else(|| ConfigError::invalid("MULTI_BINDING", &s))?,
            None => listed,
        };
        let default_binding = match var("DEFAULT_BINDING") {
            Some(name) => name.trim().to_string(),
            None => databases[0].0.clone(),
        };
        if !databases.iter().any(|(name, _)| *name == default_binding) {
            return Err(ConfigError::InvalidBindings(format!(
                "default binding '{}' is not configured",
                default_binding
            )));
        }

        let query_timeout = match var("QUERY_TIMEOUT_SECS") {
            Some(s) => match s.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::invalid("QUERY_TIMEOUT_SECS", &s)),
            },
            None => Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        };

        // Optional: rate limit
        let rate_limit_rpm = var("RATE_LIMIT_RPM")
            .and_then(|s| s.trim().parse::<u32>().ok())
            .filter(|rpm| *rpm > 0)
            .unwrap_or(DEFAULT_RATE_LIMIT_RPM);

        let max_body_bytes = var("MAX_BODY_BYTES")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_BODY_BYTES);

        // Optional: metrics token
        let metrics_token = var("METRICS_TOKEN");
        if metrics_token.is_none() {
            tracing::warn!("METRICS_TOKEN not set — /metrics endpoint is publicly accessible");
        }

        Ok(Self {
            port,
            bind_addr,
            execute_method,
            allowed_origins,
            allowed_headers,
            cors_max_age,
            gate,
            databases,
            default_binding,
            supports_multiple_bindings,
            query_timeout,
            rate_limit_rpm,
            max_body_bytes,
            metrics_token,
        })
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn parse_execute_method(s: &str) -> Result<Method, ConfigError> {
    let method = Method::from_bytes(s.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| ConfigError::invalid("EXECUTE_METHOD", s))?;
    // Statements travel in the body, so only body-carrying write verbs make sense
    if [Method::POST, Method::PUT, Method::PATCH].contains(&method) {
        Ok(method)
    } else {
        Err(ConfigError::invalid("EXECUTE_METHOD", s))
    }
}

/// Parse `name=path,name=path`.
fn parse_databases(s: &str) -> Result<Vec<(String, String)>, ConfigError> {
    let mut databases: Vec<(String, String)> = Vec::new();
    for entry in split_list(s) {
        let (name, path) = entry.split_once('=').ok_or_else(|| {
            ConfigError::InvalidBindings(format!("expected name=path, got '{}'", entry))
        })?;
        let (name, path) = (name.trim(), path.trim());
        if name.is_empty() || path.is_empty() {
            return Err(ConfigError::InvalidBindings(format!(
                "empty name or path in '{}'",
                entry
            )));
        }
        if databases.iter().any(|(existing, _)| existing == name) {
            return Err(ConfigError::InvalidBindings(format!(
                "binding '{}' listed twice",
                name
            )));
        }
        databases.push((name.to_string(), path.to_string()));
    }
    if databases.is_empty() {
        return Err(ConfigError::InvalidBindings(
            "DATABASES lists no bindings".to_string(),
        ));
    }
    Ok(databases)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },

    #[error("invalid database bindings: {0}")]
    InvalidBindings(String),
}

impl ConfigError {
    fn invalid(var: &'static str, value: &str) -> Self {
        ConfigError::InvalidValue {
            var,
            value: value.to_string(),
        }
    }
}
