use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::Simulator;

mod http;

pub struct Api {
    simulator: Arc<Simulator>,
}

impl Api {
    pub fn new(simulator: Arc<Simulator>) -> Self {
        Self { simulator }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/healthz", get(http::healthz))
            .route("/submit", post(http::submit))
            .route("/tx/:hash", get(http::receipt))
            .route("/nonce/:address", get(http::nonce))
            .route("/call", post(http::call))
            .layer(TraceLayer::new_for_http())
            .with_state(self.simulator.clone())
    }
}
