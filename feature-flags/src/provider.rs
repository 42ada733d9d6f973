use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::api::FlagError;

/// A remote source of feature flags.
///
/// Names returned by `list_all_flag_names` are raw, namespaced names, the same ones that
/// must be passed back to `evaluate`. Both calls may hit the network.
#[async_trait]
pub trait FlagProvider {
    async fn list_all_flag_names(&self) -> Result<HashSet<String>, FlagError>;
    async fn evaluate(&self, raw_name: &str) -> Result<bool, FlagError>;
}

/// Flags fixed at startup, used for local runs and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticFlagProvider {
    flags: HashMap<String, bool>,
}

impl StaticFlagProvider {
    pub fn new(flags: HashMap<String, bool>) -> Self {
        StaticFlagProvider { flags }
    }
}

/// Parses `featureManagement.a=true, featureManagement.b=false`.
impl FromStr for StaticFlagProvider {
    type Err = FlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut flags = HashMap::new();

        for entry in s.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, value) = entry
                .split_once('=')
                .ok_or_else(|| FlagError::InvalidStaticFlag(entry.to_owned()))?;
            let enabled = value
                .trim()
                .parse::<bool>()
                .map_err(|_| FlagError::InvalidStaticFlag(entry.to_owned()))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(FlagError::InvalidStaticFlag(entry.to_owned()));
            }
            flags.insert(name.to_owned(), enabled);
        }

        Ok(StaticFlagProvider::new(flags))
    }
}

#[async_trait]
impl FlagProvider for StaticFlagProvider {
    async fn list_all_flag_names(&self) -> Result<HashSet<String>, FlagError> {
        Ok(self.flags.keys().cloned().collect())
    }

    async fn evaluate(&self, raw_name: &str) -> Result<bool, FlagError> {
        self.flags
            .get(raw_name)
            .copied()
            .ok_or_else(|| FlagError::FlagNotFound(raw_name.to_owned()))
    }
}

/// Provider double for tests: serves the configured flags and records evaluations.
#[derive(Clone, Default)]
pub struct MockFlagProvider {
    flags: HashMap<String, bool>,
    fail_listing: bool,
    fail_evaluating: bool,
    evaluations: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockFlagProvider {
    pub fn new() -> MockFlagProvider {
        MockFlagProvider::default()
    }

    pub fn with_flag(mut self, raw_name: &str, enabled: bool) -> Self {
        self.flags.insert(raw_name.to_owned(), enabled);
        self
    }

    pub fn failing_list(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn failing_evaluation(mut self) -> Self {
        self.fail_evaluating = true;
        self
    }

    /// Raw names passed to `evaluate`, in call order.
    pub fn evaluations(&self) -> Vec<String> {
        match self.evaluations.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Highest number of evaluations that were pending at the same time.
    pub fn max_concurrent_evaluations(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FlagProvider for MockFlagProvider {
    async fn list_all_flag_names(&self) -> Result<HashSet<String>, FlagError> {
        if self.fail_listing {
            return Err(FlagError::MockFailure);
        }
        Ok(self.flags.keys().cloned().collect())
    }

    async fn evaluate(&self, raw_name: &str) -> Result<bool, FlagError> {
        if let Ok(mut calls) = self.evaluations.lock() {
            calls.push(raw_name.to_owned());
        }

        let pending = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(pending, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail_evaluating {
            return Err(FlagError::MockFailure);
        }
        self.flags
            .get(raw_name)
            .copied()
            .ok_or_else(|| FlagError::FlagNotFound(raw_name.to_owned()))
    }
}
