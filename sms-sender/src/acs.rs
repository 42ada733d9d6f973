use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Method};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use url::Url;

use request_signing::HmacCredential;

use crate::api::{ProviderError, SendOutcome};
use crate::config::Config;
use crate::provider::{SendOptions, SmsProvider};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest<'a> {
    from: &'a str,
    sms_recipients: Vec<SmsRecipient<'a>>,
    message: &'a str,
    sms_send_options: SmsSendOptions,
}

#[derive(Serialize)]
struct SmsRecipient<'a> {
    to: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SmsSendOptions {
    enable_delivery_report: bool,
}

#[derive(Deserialize)]
struct SendMessageResponse {
    value: Vec<SendMessageResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageResult {
    to: String,
    message_id: Option<String>,
    http_status_code: u16,
    successful: bool,
    error_message: Option<String>,
}

/// Azure Communication Services SMS, over its REST API.
pub struct AcsSmsProvider {
    endpoint: Url,
    credential: HmacCredential,
    api_version: String,
    client: reqwest::Client,
}

impl AcsSmsProvider {
    pub fn new(
        endpoint: Url,
        credential: HmacCredential,
        api_version: String,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent("sms-sender")
            .timeout(timeout)
            .build()?;

        Ok(AcsSmsProvider {
            endpoint,
            credential,
            api_version,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        AcsSmsProvider::new(
            Url::parse(&config.sms_endpoint)?,
            HmacCredential::new(None, &config.sms_access_key)?,
            config.sms_api_version.clone(),
            config.request_timeout.0,
        )
    }

    fn send_url(&self) -> Result<Url, ProviderError> {
        let mut url = self.endpoint.join("sms")?;
        url.query_pairs_mut()
            .append_pair("api-version", &self.api_version);
        Ok(url)
    }

    async fn send(
        &self,
        from: &str,
        to: &[&str],
        message: &str,
        options: &SendOptions,
    ) -> Result<Vec<SendOutcome>, ProviderError> {
        let request = SendMessageRequest {
            from,
            sms_recipients: to.iter().map(|to| SmsRecipient { to }).collect(),
            message,
            sms_send_options: SmsSendOptions {
                enable_delivery_report: options.delivery_report_enabled,
            },
        };
        let body = serde_json::to_vec(&request)?;
        let url = self.send_url()?;
        let signed = self.credential.sign(&Method::POST, &url, &body)?;

        let mut builder = self.client.post(url).body(body);
        for (name, value) in signed.iter() {
            builder = builder.header(name, value);
        }
        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(%status, body, "sms provider rejected the request");
            return Err(ProviderError::UnexpectedStatus { status, body });
        }

        let parsed: SendMessageResponse = serde_json::from_slice(&response.bytes().await?)?;
        if parsed.value.len() != to.len() {
            return Err(ProviderError::MissingOutcomes {
                expected: to.len(),
                got: parsed.value.len(),
            });
        }

        Ok(parsed
            .value
            .into_iter()
            .map(|result| {
                tracing::debug!(
                    to = %result.to,
                    message_id = ?result.message_id,
                    status = result.http_status_code,
                    successful = result.successful,
                    "sms send result"
                );
                SendOutcome {
                    recipient: result.to,
                    successful: result.successful,
                    error_message: result.error_message,
                }
            })
            .collect())
    }
}

#[async_trait]
impl SmsProvider for AcsSmsProvider {
    #[instrument(skip_all)]
    async fn send_single(
        &self,
        from: &str,
        to: &str,
        body: &str,
        options: &SendOptions,
    ) -> Result<SendOutcome, ProviderError> {
        let mut outcomes = self.send(from, &[to], body, options).await?;
        outcomes.pop().ok_or(ProviderError::MissingOutcomes {
            expected: 1,
            got: 0,
        })
    }

    #[instrument(skip_all, fields(recipients = to.len()))]
    async fn send_batch(
        &self,
        from: &str,
        to: &[String],
        body: &str,
        options: &SendOptions,
    ) -> Result<Vec<SendOutcome>, ProviderError> {
        let recipients: Vec<&str> = to.iter().map(String::as_str).collect();
        self.send(from, &recipients, body, options).await
    }
}
