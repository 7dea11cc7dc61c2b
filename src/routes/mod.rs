use std::sync::Arc;

use axum::Router;
use tower_http::{compression::CompressionLayer, limit::RequestBodyLimitLayer, validate_request::ValidateRequestHeaderLayer};

use crate::services::{OrderService, PaymentService, WithdrawService};
use auth::AuthService;

pub mod auth;
pub mod order;
pub mod tx;
pub mod user;
pub mod utils;
pub mod withdraw;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub orders: Arc<OrderService>,
    pub payments: Arc<PaymentService>,
    pub withdraws: Arc<WithdrawService>,
}

pub fn app_router(state: AppState) -> Router {
    let json_routes = order::order_routes(state.clone())
        .merge(withdraw::withdraw_routes(state.clone()))
        .merge(user::user_routes(state.clone()))
        .route_layer(ValidateRequestHeaderLayer::accept("application/json"));
    let stream_routes = tx::tx_route(state)
        .route_layer(ValidateRequestHeaderLayer::accept("text/event-stream"))
        .route_layer(CompressionLayer::new().gzip(true));

    Router::new()
        .nest("/v1", json_routes.merge(stream_routes))
        .route_layer(RequestBodyLimitLayer::new(1024 * 64))
}
