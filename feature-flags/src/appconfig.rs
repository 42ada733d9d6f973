use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::instrument;
use url::Url;

use request_signing::HmacCredential;

use crate::api::FlagError;
use crate::config::Config;
use crate::provider::FlagProvider;

const FEATURE_FLAG_KEY_PREFIX: &str = ".appconfig.featureflag/";
const API_VERSION: &str = "1.0";

#[derive(Debug, Deserialize)]
struct KeyValue {
    key: String,
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeyValuePage {
    items: Vec<KeyValue>,
    #[serde(rename = "@nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeatureFlagValue {
    enabled: bool,
    #[serde(default)]
    conditions: Option<Conditions>,
}

#[derive(Debug, Default, Deserialize)]
struct Conditions {
    #[serde(default)]
    client_filters: Vec<Value>,
}

/// Feature flags stored in Azure App Configuration.
///
/// Flags live under `.appconfig.featureflag/<id>` and are reported as `<namespace>.<id>`, so
/// the local name of each flag is its App Configuration id.
pub struct AppConfigFlagProvider {
    endpoint: Url,
    credential: HmacCredential,
    namespace: String,
    label: Option<String>,
    client: reqwest::Client,
}

impl AppConfigFlagProvider {
    pub fn new(
        endpoint: Url,
        credential: HmacCredential,
        namespace: String,
        label: Option<String>,
        timeout: Duration,
    ) -> Result<Self, FlagError> {
        let client = reqwest::Client::builder()
            .user_agent("feature-flags snapshot")
            .timeout(timeout)
            .build()?;

        Ok(AppConfigFlagProvider {
            endpoint,
            credential,
            namespace,
            label,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, FlagError> {
        let endpoint = config
            .appconfig_endpoint
            .as_deref()
            .ok_or(FlagError::MissingConfiguration("APPCONFIG_ENDPOINT"))?;
        let secret = config
            .appconfig_secret
            .as_deref()
            .ok_or(FlagError::MissingConfiguration("APPCONFIG_SECRET"))?;
        let credential = HmacCredential::new(config.appconfig_credential.clone(), secret)?;

        AppConfigFlagProvider::new(
            Url::parse(endpoint)?,
            credential,
            config.appconfig_namespace.clone(),
            config.appconfig_label.clone(),
            config.request_timeout.0,
        )
    }

    fn flag_id<'a>(&self, raw_name: &'a str) -> &'a str {
        raw_name
            .strip_prefix(self.namespace.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(raw_name)
    }

    fn list_url(&self) -> Result<Url, FlagError> {
        let mut url = self.endpoint.join("kv")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("key", &format!("{FEATURE_FLAG_KEY_PREFIX}*"));
            if let Some(label) = &self.label {
                query.append_pair("label", label);
            }
            query.append_pair("api-version", API_VERSION);
        }
        Ok(url)
    }

    fn flag_url(&self, id: &str) -> Result<Url, FlagError> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push("kv")
            .push(&format!("{FEATURE_FLAG_KEY_PREFIX}{id}"));
        {
            let mut query = url.query_pairs_mut();
            if let Some(label) = &self.label {
                query.append_pair("label", label);
            }
            query.append_pair("api-version", API_VERSION);
        }
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response, FlagError> {
        let signed = self.credential.sign(&Method::GET, &url, b"")?;

        let mut request = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json");
        for (name, value) in signed.iter() {
            request = request.header(name, value);
        }

        Ok(request.send().await?)
    }
}

#[async_trait]
impl FlagProvider for AppConfigFlagProvider {
    #[instrument(skip_all)]
    async fn list_all_flag_names(&self) -> Result<HashSet<String>, FlagError> {
        let mut names = HashSet::new();
        let mut next = Some(self.list_url()?);

        while let Some(url) = next.take() {
            let response = self.get(url).await?;
            if response.status() != StatusCode::OK {
                tracing::error!(status = %response.status(), "failed to list feature flags");
                return Err(FlagError::UnexpectedStatus(response.status()));
            }

            let page: KeyValuePage = serde_json::from_slice(&response.bytes().await?)?;
            for item in page.items {
                if let Some(id) = item.key.strip_prefix(FEATURE_FLAG_KEY_PREFIX) {
                    names.insert(format!("{}.{}", self.namespace, id));
                }
            }

            next = page
                .next_link
                .map(|link| self.endpoint.join(&link))
                .transpose()?;
        }

        tracing::debug!(count = names.len(), "listed feature flags");
        Ok(names)
    }

    #[instrument(skip(self))]
    async fn evaluate(&self, raw_name: &str) -> Result<bool, FlagError> {
        let id = self.flag_id(raw_name);
        let response = self.get(self.flag_url(id)?).await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Err(FlagError::FlagNotFound(raw_name.to_owned())),
            status => {
                tracing::error!(%status, "failed to fetch feature flag");
                return Err(FlagError::UnexpectedStatus(status));
            }
        }

        let item: KeyValue = serde_json::from_slice(&response.bytes().await?)?;
        let value: FeatureFlagValue = serde_json::from_str(item.value.as_deref().unwrap_or("{}"))?;

        // Targeting and time window filters need per-request context.
        let filtered = value
            .conditions
            .map(|c| !c.client_filters.is_empty())
            .unwrap_or(false);
        if value.enabled && filtered {
            tracing::warn!(flag = id, "flag has client filters, treating it as disabled");
            return Ok(false);
        }

        Ok(value.enabled)
    }
}
