use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use metrics::counter;
use tracing::instrument;

use crate::api::{DispatchError, DispatchResult, SendOutcome, INVALID_PHONE_NUMBER};
use crate::phone::normalize;
use crate::provider::{SendOptions, SmsProvider};

const SEND_OUTCOMES_COUNTER: &str = "sms_send_outcomes_total";

/// Sends a message to one or many recipients through an [`SmsProvider`].
///
/// Every call is a single attempt: nothing is retried, and a provider error aborts the call.
/// Numbers are normalized first, invalid ones never reach the provider.
pub struct NotificationDispatcher {
    provider: Arc<dyn SmsProvider + Send + Sync>,
    from: String,
    options: SendOptions,
    validate_group_recipients: bool,
}

impl NotificationDispatcher {
    pub fn new(
        provider: Arc<dyn SmsProvider + Send + Sync>,
        from: String,
        validate_group_recipients: bool,
    ) -> Self {
        NotificationDispatcher {
            provider,
            from,
            options: SendOptions::with_delivery_report(),
            validate_group_recipients,
        }
    }

    #[instrument(skip_all)]
    pub async fn send_one(&self, raw: &str, message: &str) -> Result<SendOutcome, DispatchError> {
        let Some(number) = normalize(raw) else {
            return Ok(rejected("single", raw));
        };

        let outcome = self
            .provider
            .send_single(&self.from, number.as_str(), message, &self.options)
            .await
            .inspect_err(|_| record("single", "error"))?;

        record("single", outcome_status(&outcome));
        Ok(outcome)
    }

    /// Like [`send_one`](Self::send_one), with the provider call running on its own task.
    ///
    /// The returned future still resolves with the finished outcome.
    #[instrument(skip_all)]
    pub async fn send_one_async(
        &self,
        raw: &str,
        message: &str,
    ) -> Result<SendOutcome, DispatchError> {
        let Some(number) = normalize(raw) else {
            return Ok(rejected("async", raw));
        };

        let provider = self.provider.clone();
        let from = self.from.clone();
        let options = self.options;
        let message = message.to_owned();
        let task = tokio::spawn(async move {
            provider
                .send_single(&from, number.as_str(), &message, &options)
                .await
        });

        let outcome = task
            .await
            .map_err(DispatchError::from)
            .and_then(|sent| sent.map_err(DispatchError::from))
            .inspect_err(|_| record("async", "error"))?;

        record("async", outcome_status(&outcome));
        Ok(outcome)
    }

    /// Sends to every recipient with one provider call.
    ///
    /// When group validation is on, invalid numbers are reported as failed and left out of the
    /// batch. Failed recipients are reported as the caller wrote them, in request order. When the
    /// provider reports a number under another spelling, its outcome is matched to the remaining
    /// recipients by position. That matching only happens when the provider returned one outcome
    /// per recipient. Otherwise the outcome keeps the provider's spelling and is listed last.
    #[instrument(skip_all, fields(recipients = raws.len()))]
    pub async fn send_group(
        &self,
        raws: &[String],
        message: &str,
    ) -> Result<DispatchResult, DispatchError> {
        let mut outcomes: Vec<(usize, SendOutcome)> = Vec::with_capacity(raws.len());
        let mut to_send: Vec<String> = Vec::with_capacity(raws.len());
        // Request index and raw input of every entry in `to_send`, by position.
        let mut submitted: Vec<(usize, &str)> = Vec::with_capacity(raws.len());
        // Provider outcomes name the number we sent, map them back to positions in `to_send`.
        let mut pending: HashMap<String, VecDeque<usize>> = HashMap::new();

        for (index, raw) in raws.iter().enumerate() {
            let recipient = if self.validate_group_recipients {
                match normalize(raw) {
                    Some(number) => number.into_string(),
                    None => {
                        let outcome = SendOutcome::failure(raw.as_str(), INVALID_PHONE_NUMBER);
                        outcomes.push((index, outcome));
                        continue;
                    }
                }
            } else {
                raw.clone()
            };
            pending
                .entry(recipient.clone())
                .or_default()
                .push_back(to_send.len());
            submitted.push((index, raw.as_str()));
            to_send.push(recipient);
        }

        if !to_send.is_empty() {
            let sent = self
                .provider
                .send_batch(&self.from, &to_send, message, &self.options)
                .await
                .inspect_err(|_| record("group", "error"))?;

            let complete = sent.len() == submitted.len();
            let mut claimed = vec![false; submitted.len()];
            let mut unmatched = Vec::new();

            for mut outcome in sent {
                match pending
                    .get_mut(&outcome.recipient)
                    .and_then(VecDeque::pop_front)
                {
                    Some(position) => {
                        claimed[position] = true;
                        let (index, raw) = submitted[position];
                        outcome.recipient = raw.to_owned();
                        outcomes.push((index, outcome));
                    }
                    None => unmatched.push(outcome),
                }
            }

            // Numbers the provider spelled differently take the unclaimed entries in order.
            let mut unclaimed = (0..submitted.len()).filter(|&position| !claimed[position]);
            for mut outcome in unmatched {
                match unclaimed.next().filter(|_| complete) {
                    Some(position) => {
                        let (index, raw) = submitted[position];
                        outcome.recipient = raw.to_owned();
                        outcomes.push((index, outcome));
                    }
                    None => {
                        tracing::warn!(
                            recipient = outcome.recipient.as_str(),
                            "provider reported an outcome for a number that was not sent"
                        );
                        outcomes.push((usize::MAX, outcome));
                    }
                }
            }
        }

        outcomes.sort_by_key(|(index, _)| *index);
        let result = DispatchResult::from_outcomes(outcomes.into_iter().map(|(_, o)| o));

        record(
            "group",
            if result.is_success() { "success" } else { "failed" },
        );
        if !result.is_success() {
            tracing::info!(
                failed = result.failures.len(),
                attempted = result.attempted,
                "group sms had failed recipients"
            );
        }
        Ok(result)
    }
}

fn rejected(operation: &'static str, raw: &str) -> SendOutcome {
    tracing::debug!(operation, "rejected invalid phone number");
    record(operation, "invalid");
    SendOutcome::failure(raw, INVALID_PHONE_NUMBER)
}

fn outcome_status(outcome: &SendOutcome) -> &'static str {
    if outcome.successful {
        "success"
    } else {
        "failed"
    }
}

fn record(operation: &'static str, status: &'static str) {
    counter!(SEND_OUTCOMES_COUNTER, "operation" => operation, "status" => status).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ProviderError;
    use crate::provider::{MockSmsProvider, SentMessage};

    const FROM: &str = "+15550000000";

    fn dispatcher(provider: &MockSmsProvider, validate_group: bool) -> NotificationDispatcher {
        NotificationDispatcher::new(Arc::new(provider.clone()), FROM.to_string(), validate_group)
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn send_one_normalizes_and_enables_delivery_reports() {
        let provider = MockSmsProvider::new();

        let outcome = dispatcher(&provider, true)
            .send_one("(555) 123-4567", "hello")
            .await
            .unwrap();

        assert_eq!(outcome, SendOutcome::success("+15551234567"));
        assert_eq!(
            provider.calls(),
            vec![SentMessage {
                from: FROM.to_string(),
                to: strings(&["+15551234567"]),
                body: "hello".to_string(),
                options: SendOptions {
                    delivery_report_enabled: true
                },
                batch: false,
            }]
        );
    }

    #[tokio::test]
    async fn invalid_numbers_never_reach_the_provider() {
        let provider = MockSmsProvider::new();
        let dispatcher = dispatcher(&provider, true);

        for raw in ["", "call me", "+44 20 7946 0958", "555-1234"] {
            let outcome = dispatcher.send_one(raw, "hello").await.unwrap();
            assert_eq!(outcome, SendOutcome::failure(raw, "invalid phone number"));

            let outcome = dispatcher.send_one_async(raw, "hello").await.unwrap();
            assert_eq!(outcome, SendOutcome::failure(raw, "invalid phone number"));
        }

        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn provider_causes_are_passed_through() {
        let provider = MockSmsProvider::new().failing_for("+15551234567", "Number is opted out");
        let dispatcher = dispatcher(&provider, true);

        let outcome = dispatcher.send_one("5551234567", "hello").await.unwrap();
        assert_eq!(
            outcome,
            SendOutcome::failure("+15551234567", "Number is opted out")
        );

        let outcome = dispatcher.send_one_async("5551234567", "hello").await.unwrap();
        assert_eq!(
            outcome,
            SendOutcome::failure("+15551234567", "Number is opted out")
        );
    }

    #[tokio::test]
    async fn send_one_async_completes_before_returning() {
        let provider = MockSmsProvider::new();

        let outcome = dispatcher(&provider, true)
            .send_one_async("1-555-123-4567", "hello")
            .await
            .unwrap();

        assert!(outcome.successful);
        assert_eq!(provider.calls().len(), 1);
        assert!(!provider.calls()[0].batch);
    }

    #[tokio::test]
    async fn transport_errors_are_errors_not_failures() {
        let provider = MockSmsProvider::new().unreachable();
        let dispatcher = dispatcher(&provider, true);

        assert!(matches!(
            dispatcher.send_one("5551234567", "hello").await,
            Err(DispatchError::Provider(ProviderError::MockFailure))
        ));
        assert!(matches!(
            dispatcher.send_one_async("5551234567", "hello").await,
            Err(DispatchError::Provider(ProviderError::MockFailure))
        ));
        assert!(matches!(
            dispatcher.send_group(&strings(&["5551234567"]), "hello").await,
            Err(DispatchError::Provider(ProviderError::MockFailure))
        ));
    }

    #[tokio::test]
    async fn group_collects_provider_failures() {
        // The provider accepts a malformed number and reports it as failed.
        let provider = MockSmsProvider::new().failing_for("555-12", "Invalid destination");

        let result = dispatcher(&provider, false)
            .send_group(&strings(&["5551234567", "555-12", "5557654321"]), "hello")
            .await
            .unwrap();

        assert!(!result.is_success());
        assert_eq!(result.attempted, 3);
        assert_eq!(result.failed_recipients(), vec!["555-12"]);
        assert_eq!(
            result.failures[0].error_message.as_deref(),
            Some("Invalid destination")
        );
        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to, strings(&["5551234567", "555-12", "5557654321"]));
    }

    #[tokio::test]
    async fn group_validation_rejects_locally() {
        let provider = MockSmsProvider::new();

        let result = dispatcher(&provider, true)
            .send_group(&strings(&["5551234567", "555-12", "1 (555) 765-4321"]), "hello")
            .await
            .unwrap();

        assert_eq!(result.failed_recipients(), vec!["555-12"]);
        assert_eq!(
            result.failures[0].error_message.as_deref(),
            Some("invalid phone number")
        );
        assert_eq!(result.attempted, 3);
        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].batch);
        assert_eq!(calls[0].to, strings(&["+15551234567", "+15557654321"]));
    }

    #[tokio::test]
    async fn group_failures_are_reported_as_written_in_request_order() {
        let provider = MockSmsProvider::new()
            .failing_for("+15551111111", "blocked")
            .failing_for("+15553333333", "blocked")
            .reversing_batches();

        let result = dispatcher(&provider, true)
            .send_group(
                &strings(&["(555) 111-1111", "bad", "5552222222", "555.333.3333"]),
                "hello",
            )
            .await
            .unwrap();

        assert_eq!(
            result.failed_recipients(),
            vec!["(555) 111-1111", "bad", "555.333.3333"]
        );
    }

    #[tokio::test]
    async fn respelled_numbers_map_back_by_position() {
        // Sent as written, reported back in E.164.
        let provider = MockSmsProvider::new()
            .failing_for("(555) 111-1111", "opted out")
            .reporting_as("(555) 111-1111", "+15551111111")
            .failing_for("555.333.3333", "unreachable")
            .reporting_as("555.333.3333", "+15553333333");

        let result = dispatcher(&provider, false)
            .send_group(
                &strings(&["(555) 111-1111", "5552222222", "555.333.3333"]),
                "hello",
            )
            .await
            .unwrap();

        assert_eq!(result.attempted, 3);
        assert_eq!(
            result.failed_recipients(),
            vec!["(555) 111-1111", "555.333.3333"]
        );
        let causes: Vec<_> = result
            .failures
            .iter()
            .map(|o| o.error_message.as_deref())
            .collect();
        assert_eq!(causes, vec![Some("opted out"), Some("unreachable")]);
    }

    #[tokio::test]
    async fn duplicate_numbers_map_back_to_each_input() {
        let provider = MockSmsProvider::new().failing_for("+15551234567", "blocked");

        let result = dispatcher(&provider, true)
            .send_group(&strings(&["5551234567", "(555) 123-4567"]), "hello")
            .await
            .unwrap();

        assert_eq!(
            result.failed_recipients(),
            vec!["5551234567", "(555) 123-4567"]
        );
    }

    #[tokio::test]
    async fn all_successful_group() {
        let provider = MockSmsProvider::new();

        let result = dispatcher(&provider, true)
            .send_group(&strings(&["5551234567", "5557654321"]), "hello")
            .await
            .unwrap();

        assert!(result.is_success());
        assert!(result.failed_recipients().is_empty());
    }

    #[tokio::test]
    async fn group_of_only_invalid_numbers_skips_the_provider() {
        let provider = MockSmsProvider::new().unreachable();

        let result = dispatcher(&provider, true)
            .send_group(&strings(&["nope", "12"]), "hello")
            .await
            .unwrap();

        assert_eq!(result.failed_recipients(), vec!["nope", "12"]);
        assert!(provider.calls().is_empty());
    }
}
