use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::utils::{authenticate, reject, require_admin};
use super::AppState;
use crate::services::NewWithdraw;

#[derive(Debug, Deserialize)]
pub struct RejectWithdraw {
    pub remarks: String,
}

#[derive(Debug, Deserialize)]
pub struct CompleteWithdraw {
    pub transaction_id: String,
    pub remarks: Option<String>,
}

async fn create_withdraw(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(payload): Json<NewWithdraw>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    let request = state.withdraws.create(actor.user_id, payload).await.map_err(reject)?;
    Ok((StatusCode::CREATED, Json(request)))
}

async fn list_withdraws(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    let requests = state.withdraws.list(actor.user_id).await.map_err(reject)?;
    Ok((StatusCode::OK, Json(requests)))
}

async fn cancel_withdraw(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(withdraw_id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    state.withdraws.cancel(actor.user_id, withdraw_id).await.map_err(reject)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn reject_withdraw(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(withdraw_id): Path<Uuid>,
    Json(payload): Json<RejectWithdraw>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    require_admin(&actor)?;
    let request = state.withdraws.reject(withdraw_id, payload.remarks).await.map_err(reject)?;
    Ok((StatusCode::OK, Json(request)))
}

async fn complete_withdraw(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(withdraw_id): Path<Uuid>,
    Json(payload): Json<CompleteWithdraw>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    require_admin(&actor)?;
    let completed = state
        .withdraws
        .complete(withdraw_id, payload.transaction_id, payload.remarks)
        .await
        .map_err(reject)?;
    tracing::info!("Withdraw {} paid out by admin: {}", withdraw_id, actor.user_id);
    Ok((StatusCode::OK, Json(completed)))
}

pub fn withdraw_routes(state: AppState) -> Router {
    Router::new()
        .route("/withdraws", post(create_withdraw).get(list_withdraws))
        .route("/withdraws/:withdraw_id", delete(cancel_withdraw))
        .route("/withdraws/:withdraw_id/reject", post(reject_withdraw))
        .route("/withdraws/:withdraw_id/complete", post(complete_withdraw))
        .with_state(state)
}
