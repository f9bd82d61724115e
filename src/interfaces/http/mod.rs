//! JSON-over-HTTP API served with `axum`.
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | `POST` | `/otp/send` | issue and deliver a code |
//! | `POST` | `/otp/verify` | verify a code |
//! | `POST` | `/accounts` | open an account |
//! | `GET` | `/accounts/:key` | balance and enrollments |
//! | `POST` | `/accounts/:key/enroll` | pay a tournament entry fee |
//! | `POST` | `/payments/add-money` | request a top-up |
//! | `POST` | `/payments/withdrawal` | request a withdrawal |
//! | `POST` | `/payments/winnings` | credit tournament winnings |
//! | `GET` | `/payments` | list requests (`status`, `type`, `identity_key`) |
//! | `GET` | `/payments/:id` | one request |
//! | `POST` | `/payments/:id/approve` | approve a pending request |
//! | `POST` | `/payments/:id/reject` | reject a pending request |
//!
//! Crediting winnings and everything that reads or settles payment requests is
//! back-office work: those routes need the admin bearer token.

mod auth;
mod error;
mod handlers;

pub use error::ApiError;

use crate::application::context::AppContext;
use axum::routing::{get, post};
use axum::{Router, middleware};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(context: Arc<AppContext>) -> Router {
    let admin = Router::new()
        .route("/payments", get(handlers::list_payments))
        .route("/payments/winnings", post(handlers::winning))
        .route("/payments/:id", get(handlers::get_payment))
        .route("/payments/:id/approve", post(handlers::approve))
        .route("/payments/:id/reject", post(handlers::reject))
        .route_layer(middleware::from_fn_with_state(
            context.clone(),
            auth::require_admin,
        ));

    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/otp/send", post(handlers::send_otp))
        .route("/otp/verify", post(handlers::verify_otp))
        .route("/accounts", post(handlers::open_account))
        .route("/accounts/:key", get(handlers::get_account))
        .route("/accounts/:key/enroll", post(handlers::enroll))
        .route("/payments/add-money", post(handlers::add_money))
        .route("/payments/withdrawal", post(handlers::withdrawal))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}
