use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use metrics::counter;

use crate::api::{ProviderError, SendOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub delivery_report_enabled: bool,
}

impl SendOptions {
    pub fn with_delivery_report() -> Self {
        SendOptions {
            delivery_report_enabled: true,
        }
    }
}

/// Something able to deliver text messages.
///
/// `send_batch` reports one outcome per recipient, in an order of its choosing. An `Err` means
/// the provider could not be reached or refused the request as a whole.
#[async_trait]
pub trait SmsProvider {
    async fn send_single(
        &self,
        from: &str,
        to: &str,
        body: &str,
        options: &SendOptions,
    ) -> Result<SendOutcome, ProviderError>;

    async fn send_batch(
        &self,
        from: &str,
        to: &[String],
        body: &str,
        options: &SendOptions,
    ) -> Result<Vec<SendOutcome>, ProviderError>;
}

/// Logs messages instead of sending them, every recipient succeeds.
pub struct PrintProvider {}

#[async_trait]
impl SmsProvider for PrintProvider {
    async fn send_single(
        &self,
        from: &str,
        to: &str,
        body: &str,
        options: &SendOptions,
    ) -> Result<SendOutcome, ProviderError> {
        tracing::info!(from, to, body, ?options, "single sms");
        counter!("sms_print_provider_messages_total").increment(1);

        Ok(SendOutcome::success(to))
    }

    async fn send_batch(
        &self,
        from: &str,
        to: &[String],
        body: &str,
        options: &SendOptions,
    ) -> Result<Vec<SendOutcome>, ProviderError> {
        let span = tracing::span!(tracing::Level::INFO, "batch of sms");
        let _enter = span.enter();

        counter!("sms_print_provider_messages_total").increment(to.len() as u64);
        Ok(to
            .iter()
            .map(|recipient| {
                tracing::info!(from, to = recipient.as_str(), body, ?options, "sms");
                SendOutcome::success(recipient.as_str())
            })
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub from: String,
    pub to: Vec<String>,
    pub body: String,
    pub options: SendOptions,
    pub batch: bool,
}

/// Provider double: succeeds for everyone except the configured failures, records every call.
#[derive(Clone, Default)]
pub struct MockSmsProvider {
    failures: HashMap<String, Option<String>>,
    renames: HashMap<String, String>,
    transport_error: bool,
    reverse_batch_order: bool,
    calls: Arc<Mutex<Vec<SentMessage>>>,
}

impl MockSmsProvider {
    pub fn new() -> MockSmsProvider {
        MockSmsProvider::default()
    }

    pub fn failing_for(mut self, recipient: &str, cause: &str) -> Self {
        self.failures
            .insert(recipient.to_owned(), Some(cause.to_owned()));
        self
    }

    /// Fail `recipient` without an error message.
    pub fn failing_silently_for(mut self, recipient: &str) -> Self {
        self.failures.insert(recipient.to_owned(), None);
        self
    }

    /// Report outcomes for `sent` under another spelling of the number.
    pub fn reporting_as(mut self, sent: &str, reported: &str) -> Self {
        self.renames.insert(sent.to_owned(), reported.to_owned());
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.transport_error = true;
        self
    }

    /// Report batch outcomes in reverse, providers are free to reorder them.
    pub fn reversing_batches(mut self) -> Self {
        self.reverse_batch_order = true;
        self
    }

    pub fn calls(&self) -> Vec<SentMessage> {
        match self.calls.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn record(&self, message: SentMessage) -> Result<(), ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(message);
        }
        if self.transport_error {
            return Err(ProviderError::MockFailure);
        }
        Ok(())
    }

    fn outcome(&self, recipient: &str) -> SendOutcome {
        let reported = self
            .renames
            .get(recipient)
            .map_or(recipient, String::as_str);
        SendOutcome {
            recipient: reported.to_owned(),
            successful: !self.failures.contains_key(recipient),
            error_message: self.failures.get(recipient).cloned().flatten(),
        }
    }
}

#[async_trait]
impl SmsProvider for MockSmsProvider {
    async fn send_single(
        &self,
        from: &str,
        to: &str,
        body: &str,
        options: &SendOptions,
    ) -> Result<SendOutcome, ProviderError> {
        self.record(SentMessage {
            from: from.to_owned(),
            to: vec![to.to_owned()],
            body: body.to_owned(),
            options: *options,
            batch: false,
        })?;
        Ok(self.outcome(to))
    }

    async fn send_batch(
        &self,
        from: &str,
        to: &[String],
        body: &str,
        options: &SendOptions,
    ) -> Result<Vec<SendOutcome>, ProviderError> {
        self.record(SentMessage {
            from: from.to_owned(),
            to: to.to_vec(),
            body: body.to_owned(),
            options: *options,
            batch: true,
        })?;

        let mut outcomes: Vec<SendOutcome> = to.iter().map(|r| self.outcome(r)).collect();
        if self.reverse_batch_order {
            outcomes.reverse();
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn print_provider_succeeds_for_everyone() {
        let provider = PrintProvider {};
        let options = SendOptions::with_delivery_report();

        let outcome = provider
            .send_single("+15550000000", "+15551234567", "hi", &options)
            .await
            .unwrap();
        assert_eq!(outcome, SendOutcome::success("+15551234567"));

        let outcomes = provider
            .send_batch(
                "+15550000000",
                &["+15551234567".to_string(), "+15557654321".to_string()],
                "hi",
                &options,
            )
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.successful));
    }
}
