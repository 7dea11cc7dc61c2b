use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::utils::{authenticate, reject, require_admin};
use super::AppState;
use crate::db::Role;
use crate::services::NewOrder;
use crate::Amount;

#[derive(Debug, Deserialize)]
pub struct RejectOrder {
    pub remarks: String,
}

#[derive(Debug, Deserialize)]
pub struct ShipOrder {
    pub tracking_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteOrder {
    pub amount_paid_by_customer: Amount,
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderRemarks {
    pub remarks: Option<String>,
}

async fn create_order(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(payload): Json<NewOrder>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    if actor.role != Role::Seller {
        return Err((StatusCode::FORBIDDEN, "Only sellers can place orders".to_string()));
    }

    let order = state.orders.create(actor.user_id, payload).await.map_err(reject)?;
    tracing::info!("Order {} placed by seller: {}", order.order.id, actor.user_id);
    Ok((StatusCode::CREATED, Json(order)))
}

async fn get_order(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    let order = state.orders.get(order_id, actor).await.map_err(reject)?;
    Ok((StatusCode::OK, Json(order)))
}

async fn approve_order(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    require_admin(&actor)?;
    let update = state.orders.approve(order_id).await.map_err(reject)?;
    Ok((StatusCode::OK, Json(update)))
}

async fn reject_order(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<RejectOrder>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    require_admin(&actor)?;
    let update = state.orders.reject(order_id, payload.remarks).await.map_err(reject)?;
    Ok((StatusCode::OK, Json(update)))
}

async fn process_order(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    require_admin(&actor)?;
    let update = state.orders.process(order_id).await.map_err(reject)?;
    Ok((StatusCode::OK, Json(update)))
}

async fn ship_order(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<ShipOrder>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    require_admin(&actor)?;
    let update = state.orders.ship(order_id, payload.tracking_url).await.map_err(reject)?;
    Ok((StatusCode::OK, Json(update)))
}

async fn complete_order(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<CompleteOrder>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    require_admin(&actor)?;
    let update = state
        .orders
        .complete(order_id, payload.amount_paid_by_customer)
        .await
        .map_err(reject)?;
    Ok((StatusCode::OK, Json(update)))
}

async fn return_order(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(payload): Json<OrderRemarks>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    require_admin(&actor)?;
    let update = state.orders.mark_returned(order_id, payload.remarks).await.map_err(reject)?;
    Ok((StatusCode::OK, Json(update)))
}

// admins cancel outright; sellers only flag the order for the admin
async fn cancel_order(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    payload: Option<Json<OrderRemarks>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    let remarks = payload.map(|Json(body)| body).unwrap_or_default().remarks;

    let update = if actor.is_admin() {
        state.orders.cancel_by_admin(order_id, remarks).await
    } else {
        state.orders.cancel_by_seller(order_id, actor.user_id).await
    }
    .map_err(reject)?;

    Ok((StatusCode::OK, Json(update)))
}

pub fn order_routes(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:order_id", get(get_order))
        .route("/orders/:order_id/approve", post(approve_order))
        .route("/orders/:order_id/reject", post(reject_order))
        .route("/orders/:order_id/process", post(process_order))
        .route("/orders/:order_id/ship", post(ship_order))
        .route("/orders/:order_id/complete", post(complete_order))
        .route("/orders/:order_id/return", post(return_order))
        .route("/orders/:order_id/cancel", post(cancel_order))
        .with_state(state)
}
