use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{RegistrationError, Result};

/// The only gateway code that confirms a payment.
pub const PAYMENT_SUCCESS_CODE: &str = "PAYMENT_SUCCESS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CallbackOutcome {
    Success {
        #[serde(rename = "transactionId")]
        transaction_id: String,
    },
    Failed {
        #[serde(rename = "reasonCode")]
        reason_code: String,
    },
}

impl CallbackOutcome {
    /// Maps a gateway status code; anything but `PAYMENT_SUCCESS` is a failure.
    pub fn from_code(code: &str, transaction_id: Option<String>) -> Result<Self> {
        if code == PAYMENT_SUCCESS_CODE {
            let transaction_id = transaction_id.filter(|id| !id.is_empty()).ok_or_else(|| {
                RegistrationError::DecodeError(
                    "successful payment without transactionId".to_string(),
                )
            })?;
            Ok(Self::Success { transaction_id })
        } else {
            Ok(Self::Failed {
                reason_code: code.to_string(),
            })
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            CallbackOutcome::Success { .. } => "success",
            CallbackOutcome::Failed { .. } => "failed",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CallbackOutcome::Success { .. })
    }
}

/// JSON envelope the gateway base64-encodes into callbacks and status replies.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayEnvelope {
    #[serde(default)]
    pub success: bool,
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    pub data: EnvelopeData,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeData {
    #[serde(default)]
    pub merchant_id: Option<String>,
    pub merchant_transaction_id: String,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub state: Option<String>,
}

/// A callback body that decoded cleanly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedCallback {
    pub order_id: String,
    pub outcome: CallbackOutcome,
    pub amount: Option<i64>,
}

/// Decodes the base64 `response` field of a gateway callback.
pub fn decode_callback(response: &str) -> Result<DecodedCallback> {
    let bytes = STANDARD
        .decode(response.trim())
        .map_err(|e| RegistrationError::DecodeError(format!("invalid base64: {e}")))?;
    let envelope: GatewayEnvelope = serde_json::from_slice(&bytes)
        .map_err(|e| RegistrationError::DecodeError(format!("invalid JSON: {e}")))?;

    let order_id = envelope.data.merchant_transaction_id.trim().to_string();
    if order_id.is_empty() {
        return Err(RegistrationError::DecodeError(
            "empty merchantTransactionId".to_string(),
        ));
    }

    let outcome = CallbackOutcome::from_code(&envelope.code, envelope.data.transaction_id)?;
    Ok(DecodedCallback {
        order_id,
        outcome,
        amount: envelope.data.amount,
    })
}
