use crate::bindings::BindingTable;
use crate::config::GatewayConfig;
use crate::cors::CorsPolicy;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub bindings: Arc<BindingTable>,
    pub cors: Arc<CorsPolicy>,
}

impl AppState {
    pub fn new(config: GatewayConfig, bindings: BindingTable) -> Self {
        let cors = CorsPolicy::from_config(&config);
        Self {
            config: Arc::new(config),
            bindings: Arc::new(bindings),
            cors: Arc::new(cors),
        }
    }
}
