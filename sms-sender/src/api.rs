use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use request_signing::SigningError;

/// Cause reported for recipients rejected before reaching the provider.
pub const INVALID_PHONE_NUMBER: &str = "invalid phone number";

/// Cause reported when the provider marks a send as failed without saying why.
pub const UNSPECIFIED_FAILURE: &str = "message was not delivered";

/// Result of sending to one recipient, as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendOutcome {
    pub recipient: String,
    pub successful: bool,
    pub error_message: Option<String>,
}

impl SendOutcome {
    pub fn success(recipient: impl Into<String>) -> Self {
        SendOutcome {
            recipient: recipient.into(),
            successful: true,
            error_message: None,
        }
    }

    pub fn failure(recipient: impl Into<String>, cause: impl Into<String>) -> Self {
        SendOutcome {
            recipient: recipient.into(),
            successful: false,
            error_message: Some(cause.into()),
        }
    }
}

/// Aggregate of one dispatch: successful only when every recipient was.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchResult {
    pub attempted: usize,
    pub failures: Vec<SendOutcome>,
}

impl DispatchResult {
    pub fn from_outcomes(outcomes: impl IntoIterator<Item = SendOutcome>) -> Self {
        let mut result = DispatchResult::default();
        for outcome in outcomes {
            result.attempted += 1;
            if !outcome.successful {
                result.failures.push(outcome);
            }
        }
        result
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed_recipients(&self) -> Vec<String> {
        self.failures.iter().map(|o| o.recipient.clone()).collect()
    }
}

/// Errors raised while talking to the SMS provider, as opposed to delivery failures it reports.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("sms provider request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("sms provider answered with status {status}: {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
    #[error("failed to parse sms provider response: {0}")]
    ResponseParsingError(#[from] serde_json::Error),
    #[error("sms provider returned {got} results for {expected} recipients")]
    MissingOutcomes { expected: usize, got: usize },
    #[error("failed to sign sms provider request: {0}")]
    SigningError(#[from] SigningError),
    #[error("invalid sms provider url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("mock provider failure")]
    MockFailure,
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error("send task did not complete: {0}")]
    TaskFailed(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SmsStatus {
    Success,
    Failed,
    Error,
}

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SmsResponse {
    pub status: SmsStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(
        rename = "failedAddresses",
        skip_serializing_if = "Option::is_none"
    )]
    pub failed_addresses: Option<Vec<String>>,
}

impl SmsResponse {
    pub fn success() -> Self {
        SmsResponse {
            status: SmsStatus::Success,
            cause: None,
            failed_addresses: None,
        }
    }

    pub fn failed(cause: Option<String>) -> Self {
        SmsResponse {
            status: SmsStatus::Failed,
            cause,
            failed_addresses: None,
        }
    }

    pub fn failed_addresses(addresses: Vec<String>) -> Self {
        SmsResponse {
            status: SmsStatus::Failed,
            cause: None,
            failed_addresses: Some(addresses),
        }
    }

    pub fn error() -> Self {
        SmsResponse {
            status: SmsStatus::Error,
            cause: None,
            failed_addresses: None,
        }
    }
}

impl IntoResponse for SendOutcome {
    fn into_response(self) -> Response {
        if self.successful {
            (StatusCode::OK, Json(SmsResponse::success())).into_response()
        } else {
            let cause = self
                .error_message
                .unwrap_or_else(|| UNSPECIFIED_FAILURE.to_owned());
            (
                StatusCode::BAD_REQUEST,
                Json(SmsResponse::failed(Some(cause))),
            )
                .into_response()
        }
    }
}

impl IntoResponse for DispatchResult {
    fn into_response(self) -> Response {
        if self.is_success() {
            (StatusCode::OK, Json(SmsResponse::success())).into_response()
        } else {
            (
                StatusCode::BAD_REQUEST,
                Json(SmsResponse::failed_addresses(self.failed_recipients())),
            )
                .into_response()
        }
    }
}

impl IntoResponse for DispatchError {
    /// The cause stays in the logs, callers only learn that sending errored.
    fn into_response(self) -> Response {
        tracing::error!("sms dispatch errored: {}", self);
        (StatusCode::INTERNAL_SERVER_ERROR, Json(SmsResponse::error())).into_response()
    }
}
