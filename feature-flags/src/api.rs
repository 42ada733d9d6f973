use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use request_signing::SigningError;

#[derive(Error, Debug)]
pub enum FlagError {
    #[error("flag provider request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("flag provider answered with status {0}")]
    UnexpectedStatus(StatusCode),
    #[error("failed to parse flag provider response: {0}")]
    ResponseParsingError(#[from] serde_json::Error),
    #[error("flag {0} does not exist in the provider")]
    FlagNotFound(String),
    #[error("failed to sign flag provider request: {0}")]
    SigningError(#[from] SigningError),
    #[error("invalid provider url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("invalid static flag entry {0:?}, expected name=true or name=false")]
    InvalidStaticFlag(String),
    #[error("missing configuration: {0}")]
    MissingConfiguration(&'static str),
    #[error("mock provider failure")]
    MockFailure,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FlagResponse {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct OverrideRequest {
    pub enabled: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DemoValueResponse {
    pub question: String,
    pub answer: String,
    pub feature_flag_status: String,
}
