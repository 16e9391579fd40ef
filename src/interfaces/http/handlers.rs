use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use axum::response::Html;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::page::render_verify_page;
use super::response::json_body;
use crate::application::service::RegistrationService;
use crate::domain::callback::CallbackOutcome;
use crate::domain::checksum::VERIFY_HEADER;
use crate::domain::registration::{AvailabilityQuery, RegistrationRequest};
use crate::error::RegistrationError;

type ServiceState = State<Arc<RegistrationService>>;
type ApiResult<T> = Result<Json<T>, RegistrationError>;

pub const WELCOME_TEXT: &str = "Welcome to the registration service";

#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub success: bool,
    pub payment_url: String,
    pub order_id: String,
    pub ticket_number: String,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    pub response: String,
}

#[derive(Debug, Serialize)]
pub struct CallbackResponse {
    pub success: bool,
    pub status: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    #[serde(default)]
    pub order_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub success: bool,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub details: serde_json::Value,
}

pub async fn welcome() -> &'static str {
    WELCOME_TEXT
}

pub async fn check_registration(
    State(service): ServiceState,
    payload: Result<Json<AvailabilityQuery>, JsonRejection>,
) -> ApiResult<AvailabilityResponse> {
    service.check_registration(json_body(payload)?).await?;
    Ok(Json(AvailabilityResponse {
        success: true,
        message: "Registration available",
    }))
}

pub async fn register(
    State(service): ServiceState,
    payload: Result<Json<RegistrationRequest>, JsonRejection>,
) -> ApiResult<RegisterResponse> {
    let receipt = service.register(json_body(payload)?).await?;
    Ok(Json(RegisterResponse {
        success: true,
        payment_url: receipt.payment_url,
        order_id: receipt.order_id,
        ticket_number: receipt.ticket_number,
    }))
}

pub async fn payment_callback(
    State(service): ServiceState,
    headers: HeaderMap,
    payload: Result<Json<CallbackBody>, JsonRejection>,
) -> ApiResult<CallbackResponse> {
    let checksum = headers
        .get(VERIFY_HEADER)
        .and_then(|value| value.to_str().ok());
    let body = json_body(payload)?;

    let receipt = service.handle_callback(checksum, &body.response).await?;
    Ok(Json(CallbackResponse {
        success: true,
        status: receipt.outcome.status(),
    }))
}

pub async fn check_payment_status(
    State(service): ServiceState,
    payload: Result<Json<StatusQuery>, JsonRejection>,
) -> ApiResult<StatusResponse> {
    let query = json_body(payload)?;
    let status = service.payment_status(&query.order_id).await?;

    let transaction_id = match &status.outcome {
        CallbackOutcome::Success { transaction_id } => Some(transaction_id.clone()),
        CallbackOutcome::Failed { .. } => None,
    };
    Ok(Json(StatusResponse {
        success: status.success,
        status: status.outcome.status(),
        transaction_id,
        details: status.details,
    }))
}

pub async fn verify_page(State(service): ServiceState) -> Html<String> {
    Html(render_verify_page(&service.urls().payment_status_page()))
}
