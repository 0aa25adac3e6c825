use axum::{
    extract::{Path, State as AxumState},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use werewolf_types::{
    api::{CallRequest, ErrorResponse, NonceResponse, SignedInvocation, SubmitResponse},
    Address,
};

use crate::{Simulator, SubmitError};

#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

fn rejection(err: SubmitError) -> Response {
    tracing::debug!(error = %err, "request rejected");
    let status = match err {
        SubmitError::UnknownContract(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    };
    error_response(status, err)
}

pub(super) async fn healthz() -> Response {
    Json(HealthzResponse { ok: true }).into_response()
}

pub(super) async fn submit(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Json(signed): Json<SignedInvocation>,
) -> Response {
    match simulator.submit(signed).await {
        Ok(transaction_hash) => Json(SubmitResponse { transaction_hash }).into_response(),
        Err(err) => rejection(err),
    }
}

pub(super) async fn receipt(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Path(hash): Path<String>,
) -> Response {
    match simulator.receipt(&hash).await {
        Some(receipt) => Json(receipt).into_response(),
        None => error_response(StatusCode::NOT_FOUND, "Transaction not found"),
    }
}

pub(super) async fn nonce(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Path(address): Path<String>,
) -> Response {
    let nonce = simulator.nonce(&Address::new(address)).await;
    Json(NonceResponse { nonce }).into_response()
}

pub(super) async fn call(
    AxumState(simulator): AxumState<Arc<Simulator>>,
    Json(request): Json<CallRequest>,
) -> Response {
    match simulator.call(&request).await {
        Ok(value) => Json(value).into_response(),
        Err(err) => rejection(err),
    }
}
