use crate::domain::callback::{CallbackOutcome, PAYMENT_SUCCESS_CODE};
use crate::domain::checksum::{ChecksumSigner, VERIFY_HEADER};
use crate::domain::ports::{PaymentGateway, PaymentRequest, PaymentSession, PaymentStatus};
use crate::error::{RegistrationError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const SERVICE: &str = "payment gateway";

/// Endpoint path the pay request checksum is computed over.
pub const PAY_ENDPOINT: &str = "/pg/v1/pay";

const MAX_TRANSACTION_ID_LEN: usize = 35;
const MAX_USER_ID_LEN: usize = 50;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PayPayload<'a> {
    merchant_id: &'a str,
    merchant_transaction_id: &'a str,
    merchant_user_id: &'a str,
    amount: i64,
    redirect_url: &'a str,
    redirect_mode: &'static str,
    callback_url: &'a str,
    mobile_number: &'a str,
    payment_instrument: PaymentInstrument,
}

#[derive(Debug, Serialize)]
struct PaymentInstrument {
    r#type: &'static str,
}

#[derive(Debug, Serialize)]
struct PayBody {
    request: String,
}

#[derive(Debug, Deserialize)]
struct PayResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<PayResponseData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PayResponseData {
    instrument_response: Option<InstrumentResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentResponse {
    redirect_info: Option<RedirectInfo>,
}

#[derive(Debug, Deserialize)]
struct RedirectInfo {
    url: String,
}

fn truncate(value: &str, max_chars: usize) -> &str {
    match value.char_indices().nth(max_chars) {
        Some((idx, _)) => &value[..idx],
        None => value,
    }
}

/// PhonePe standard checkout ("PAY_PAGE") client.
pub struct PhonePeGateway {
    client: Client,
    api_url: String,
    merchant_id: String,
    signer: ChecksumSigner,
    timeout: Duration,
}

impl PhonePeGateway {
    pub fn new(
        api_url: impl Into<String>,
        merchant_id: impl Into<String>,
        signer: ChecksumSigner,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| RegistrationError::from_http(SERVICE, timeout, e))?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            merchant_id: merchant_id.into(),
            signer,
            timeout,
        })
    }

    fn status_endpoint(&self, order_id: &str) -> String {
        format!("/pg/v1/status/{}/{}", self.merchant_id, order_id)
    }

    /// Body and `X-VERIFY` value of a pay request.
    fn signed_pay_request(&self, request: &PaymentRequest) -> Result<(PayBody, String)> {
        let payload = PayPayload {
            merchant_id: &self.merchant_id,
            merchant_transaction_id: truncate(&request.order_id, MAX_TRANSACTION_ID_LEN),
            merchant_user_id: truncate(&request.user_id, MAX_USER_ID_LEN),
            amount: request.amount_minor,
            redirect_url: &request.redirect_url,
            redirect_mode: "POST",
            callback_url: &request.callback_url,
            mobile_number: &request.mobile_number,
            payment_instrument: PaymentInstrument { r#type: "PAY_PAGE" },
        };
        let (encoded, checksum) = self.signer.sign(&payload, PAY_ENDPOINT)?;
        Ok((PayBody { request: encoded }, checksum.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for PhonePeGateway {
    async fn initiate(&self, request: PaymentRequest) -> Result<PaymentSession> {
        let (body, checksum) = self.signed_pay_request(&request)?;
        debug!(order_id = %request.order_id, "Initiating payment");

        let response = self
            .client
            .post(format!("{}/pay", self.api_url))
            .header(VERIFY_HEADER, checksum)
            .json(&body)
            .send()
            .await
            .map_err(|e| RegistrationError::from_http(SERVICE, self.timeout, e))?;

        let data: PayResponse = response
            .json()
            .await
            .map_err(|e| RegistrationError::from_http(SERVICE, self.timeout, e))?;

        if !data.success {
            warn!(order_id = %request.order_id, code = ?data.code, "Payment initialization rejected");
            return Err(RegistrationError::upstream(
                SERVICE,
                data.message
                    .unwrap_or_else(|| "Payment initialization failed".to_string()),
            ));
        }

        let redirect_url = data
            .data
            .and_then(|d| d.instrument_response)
            .and_then(|i| i.redirect_info)
            .map(|r| r.url)
            .ok_or_else(|| RegistrationError::upstream(SERVICE, "response missing redirect url"))?;

        Ok(PaymentSession { redirect_url })
    }

    async fn status(&self, order_id: &str) -> Result<PaymentStatus> {
        let checksum = self.signer.sign_path(&self.status_endpoint(order_id));

        let response = self
            .client
            .get(format!("{}/status/{}/{}", self.api_url, self.merchant_id, order_id))
            .header(VERIFY_HEADER, checksum.to_string())
            .header("X-MERCHANT-ID", &self.merchant_id)
            .send()
            .await
            .map_err(|e| RegistrationError::from_http(SERVICE, self.timeout, e))?;

        let details: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RegistrationError::from_http(SERVICE, self.timeout, e))?;

        Ok(status_from_details(details))
    }
}

/// Interprets a status reply; a success code without a transaction id is
/// reported as a failure rather than an error.
fn status_from_details(details: serde_json::Value) -> PaymentStatus {
    let success = details
        .get("success")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    let code = details
        .get("code")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();
    let transaction_id = details
        .pointer("/data/transactionId")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let outcome = CallbackOutcome::from_code(&code, transaction_id).unwrap_or(CallbackOutcome::Failed {
        reason_code: if code.is_empty() {
            "UNKNOWN".to_string()
        } else {
            code.clone()
        },
    });

    PaymentStatus {
        success: success && code == PAYMENT_SUCCESS_CODE,
        outcome,
        details,
    }
}
