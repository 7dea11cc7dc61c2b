use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{sse::Event, IntoResponse, Sse},
    routing::get,
    Router,
};
use futures::StreamExt;

use super::utils::{authenticate, reject};
use super::AppState;

// stream every ledger entry of the caller, newest first
async fn list_transactions(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let actor = authenticate(&headers, &state.auth)?;

    let transactions = state.payments.transactions(actor.user_id).await.map_err(reject)?;
    tracing::info!("Streaming {} transactions for user: {}", transactions.len(), actor.user_id);

    let stream = futures::stream::iter(transactions).map(|transaction| Event::default().json_data(transaction));

    let sse = Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(std::time::Duration::from_secs(2))
            .text("keep-alive-text"),
    );

    Ok(sse)
}

pub fn tx_route(state: AppState) -> Router {
    Router::new()
        .route("/tx/list_txs", get(list_transactions))
        .with_state(state)
}
