use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::api::{DispatchError, DispatchResult, SendOutcome, SmsResponse};
use crate::dispatcher::NotificationDispatcher;

/// Query parameters shared by the sms routes: `toAddress` (repeatable) and `message`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SmsQuery {
    pub to_addresses: Vec<String>,
    pub message: String,
}

#[derive(Debug, PartialEq, Eq)]
pub struct BadQuery(pub &'static str);

impl IntoResponse for BadQuery {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_REQUEST,
            Json(SmsResponse::failed(Some(self.0.to_owned()))),
        )
            .into_response()
    }
}

impl SmsQuery {
    /// Parses a raw query string, keeping every `toAddress` in order.
    pub fn parse(query: Option<&str>) -> Result<SmsQuery, BadQuery> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query.unwrap_or_default())
            .map_err(|_| BadQuery("malformed query string"))?;

        let mut parsed = SmsQuery::default();
        let mut message = None;
        for (key, value) in pairs {
            match key.as_str() {
                "toAddress" => parsed.to_addresses.push(value),
                "message" => message = Some(value),
                _ => {}
            }
        }

        if parsed.to_addresses.is_empty() {
            return Err(BadQuery("missing toAddress"));
        }
        parsed.message = message.ok_or(BadQuery("missing message"))?;
        Ok(parsed)
    }
}

pub async fn send_sms(
    State(dispatcher): State<Arc<NotificationDispatcher>>,
    RawQuery(query): RawQuery,
) -> Result<Result<SendOutcome, DispatchError>, BadQuery> {
    let query = SmsQuery::parse(query.as_deref())?;

    Ok(dispatcher
        .send_one(&query.to_addresses[0], &query.message)
        .await)
}

pub async fn send_sms_async(
    State(dispatcher): State<Arc<NotificationDispatcher>>,
    RawQuery(query): RawQuery,
) -> Result<Result<SendOutcome, DispatchError>, BadQuery> {
    let query = SmsQuery::parse(query.as_deref())?;

    Ok(dispatcher
        .send_one_async(&query.to_addresses[0], &query.message)
        .await)
}

pub async fn send_group_sms(
    State(dispatcher): State<Arc<NotificationDispatcher>>,
    RawQuery(query): RawQuery,
) -> Result<Result<DispatchResult, DispatchError>, BadQuery> {
    let query = SmsQuery::parse(query.as_deref())?;

    Ok(dispatcher
        .send_group(&query.to_addresses, &query.message)
        .await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_repeated_addresses_in_order() {
        let raw = "toAddress=5551234567&message=hi%20there&toAddress=%2B15557654321";

        let query = SmsQuery::parse(Some(raw)).unwrap();

        assert_eq!(
            query,
            SmsQuery {
                to_addresses: vec!["5551234567".to_string(), "+15557654321".to_string()],
                message: "hi there".to_string(),
            }
        );
    }

    #[test]
    fn plus_decodes_to_a_space() {
        let query = SmsQuery::parse(Some("toAddress=+15551234567&message=a+b")).unwrap();

        assert_eq!(query.to_addresses, vec![" 15551234567"]);
        assert_eq!(query.message, "a b");
    }

    #[test]
    fn requires_both_parameters() {
        assert_eq!(SmsQuery::parse(None), Err(BadQuery("missing toAddress")));
        assert_eq!(
            SmsQuery::parse(Some("message=hi")),
            Err(BadQuery("missing toAddress"))
        );
        assert_eq!(
            SmsQuery::parse(Some("toAddress=5551234567")),
            Err(BadQuery("missing message"))
        );
    }

    #[test]
    fn empty_message_is_allowed() {
        let query = SmsQuery::parse(Some("toAddress=5551234567&message=")).unwrap();

        assert_eq!(query.message, "");
    }
}
