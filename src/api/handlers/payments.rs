use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::{
    api::state::AppState,
    domain::{
        CreatePaymentRequest, PaginationResult, PaymentHistory, PaymentListParams,
        PaymentResponse, WebhookRequest,
    },
    error::{AppError, Result},
    payments::verify_signature,
};

pub async fn create(
    State(state): State<AppState>,
    payload: std::result::Result<Json<CreatePaymentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PaymentResponse>)> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    let payment = state.payment_service.create(request).await?;

    Ok((StatusCode::CREATED, Json(payment)))
}

pub async fn list(
    State(state): State<AppState>,
    params: std::result::Result<Query<PaymentListParams>, QueryRejection>,
) -> Result<Json<PaginationResult<PaymentResponse>>> {
    let Query(params) = params.map_err(|e| AppError::Validation(e.body_text()))?;

    Ok(Json(state.payment_service.list(params).await?))
}

pub async fn get(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<PaymentResponse>> {
    Ok(Json(state.payment_service.get_by_uuid(uuid).await?))
}

pub async fn histories(
    State(state): State<AppState>,
    Path(uuid): Path<Uuid>,
) -> Result<Json<Vec<PaymentHistory>>> {
    Ok(Json(state.payment_service.histories(uuid).await?))
}

pub async fn webhook(
    State(state): State<AppState>,
    payload: std::result::Result<Json<WebhookRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = payload.map_err(|e| AppError::Validation(e.body_text()))?;

    if state.settings.midtrans.verify_signature {
        check_signature(&state.settings.midtrans.server_key, &request)?;
    }

    state.payment_service.reconcile_webhook(request).await?;

    Ok(Json(json!({ "message": "ok" })))
}

fn check_signature(server_key: &str, request: &WebhookRequest) -> Result<()> {
    let (Some(status_code), Some(gross_amount), Some(signature_key)) = (
        request.status_code.as_deref(),
        request.gross_amount.as_deref(),
        request.signature_key.as_deref(),
    ) else {
        tracing::warn!("Webhook for order {} is missing signature fields", request.order_id);
        return Err(AppError::Unauthorized);
    };

    if !verify_signature(server_key, &request.order_id, status_code, gross_amount, signature_key) {
        tracing::warn!("Webhook for order {} failed signature verification", request.order_id);
        return Err(AppError::Unauthorized);
    }

    Ok(())
}
