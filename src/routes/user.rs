use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use uuid::Uuid;

use super::utils::{authenticate, reject, require_admin};
use super::AppState;
use crate::calc::WalletProvider;
use crate::services::ExternalPayment;

async fn get_user(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    tracing::info!("Token validation succeeded for user: {}", actor.user_id);

    let user = state.payments.user(actor.user_id).await.map_err(reject)?;
    Ok((StatusCode::OK, Json(user)))
}

/// A payment an admin has confirmed for `user_id`.
#[derive(Debug, Deserialize)]
pub struct ConfirmedPayment {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub payment: ExternalPayment,
}

async fn deposit(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(payload): Json<ConfirmedPayment>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    require_admin(&actor)?;
    let receipt = state
        .payments
        .deposit(actor, payload.user_id, payload.payment)
        .await
        .map_err(reject)?;
    tracing::info!(
        "User balance updated successfully for user: {}. New balance: {}",
        payload.user_id,
        receipt.balance
    );
    Ok((StatusCode::OK, Json(receipt)))
}

async fn pay_due(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(payload): Json<ConfirmedPayment>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    require_admin(&actor)?;
    let receipt = state
        .payments
        .pay_due(actor, payload.user_id, payload.payment)
        .await
        .map_err(reject)?;
    Ok((StatusCode::OK, Json(receipt)))
}

#[derive(Debug, Deserialize)]
pub struct AddWallet {
    pub wallet_name: WalletProvider,
    pub wallet_phone_no: String,
}

async fn add_wallet(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(payload): Json<AddWallet>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    let wallet = state
        .withdraws
        .add_wallet(actor.user_id, payload.wallet_name, payload.wallet_phone_no)
        .await
        .map_err(reject)?;
    Ok((StatusCode::CREATED, Json(wallet)))
}

async fn list_wallets(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;
    let wallets = state.withdraws.list_wallets(actor.user_id).await.map_err(reject)?;
    Ok((StatusCode::OK, Json(wallets)))
}

pub fn user_routes(state: AppState) -> Router {
    Router::new()
        .route("/users/me", get(get_user))
        .route("/payments/deposit", post(deposit))
        .route("/payments/due", post(pay_due))
        .route("/wallets", post(add_wallet).get(list_wallets))
        .with_state(state)
}
