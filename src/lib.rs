//! License issuance and retrieval service for Renaym.
//!
//! Receives Stripe payment webhooks, mints license keys, persists them as
//! metadata on customer records, and lets purchasers retrieve their key
//! later by email (gated by an emailed verification code).

pub mod config;
pub mod email;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod license;
pub mod payments;
pub mod state;
pub mod store;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;

/// Assemble the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::public::router())
        .merge(handlers::webhooks::router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
