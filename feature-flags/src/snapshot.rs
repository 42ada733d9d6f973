use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::instrument;

use crate::api::FlagError;
use crate::flag_name::local_name;
use crate::provider::FlagProvider;

/// Evaluations allowed in flight at once while building a snapshot.
pub const EVALUATION_CONCURRENCY: usize = 8;

#[derive(Debug, Default)]
struct FlagState {
    flags: HashMap<String, bool>,
    // Always equal to the key set of `flags`.
    names: HashSet<String>,
}

/// Point-in-time copy of every flag known to a provider, keyed by local name.
///
/// The provider is queried once in [`FeatureFlagSnapshot::build`] and never again: lookups are
/// served from memory, and picking up remote changes means building a new snapshot. Entries can
/// be overridden locally, overrides are never written back to the provider.
///
/// Unknown flags are disabled. Asking for a flag that does not exist is not an error.
#[derive(Debug, Default)]
pub struct FeatureFlagSnapshot {
    state: RwLock<FlagState>,
}

impl FeatureFlagSnapshot {
    /// Lists every flag in the provider and evaluates each of them exactly once.
    ///
    /// Fails if any provider call fails. When two raw names share a local name, the one that
    /// sorts last wins.
    #[instrument(skip_all)]
    pub async fn build(provider: &(dyn FlagProvider + Send + Sync)) -> Result<Self, FlagError> {
        let mut raw_names: Vec<String> =
            provider.list_all_flag_names().await?.into_iter().collect();
        raw_names.sort();

        let evaluations: Vec<_> = raw_names.iter().map(|raw| provider.evaluate(raw)).collect();
        let values: Vec<bool> = stream::iter(evaluations)
            .buffered(EVALUATION_CONCURRENCY)
            .try_collect()
            .await?;

        let mut state = FlagState::default();
        for (raw, enabled) in raw_names.iter().zip(values) {
            let name = local_name(raw);
            if state.flags.insert(name.to_owned(), enabled).is_some() {
                tracing::warn!(raw_name = raw, name, "duplicate local flag name, overwriting");
            }
            state.names.insert(name.to_owned());
        }

        tracing::info!(flags = state.flags.len(), "built feature flag snapshot");
        metrics::gauge!("feature_flag_snapshot_flags").set(state.flags.len() as f64);

        Ok(FeatureFlagSnapshot {
            state: RwLock::new(state),
        })
    }

    /// Snapshot from already evaluated flags, names are used as given.
    pub fn from_flags<I, S>(flags: I) -> Self
    where
        I: IntoIterator<Item = (S, bool)>,
        S: Into<String>,
    {
        let mut state = FlagState::default();
        for (name, enabled) in flags {
            let name = name.into();
            state.names.insert(name.clone());
            state.flags.insert(name, enabled);
        }
        FeatureFlagSnapshot {
            state: RwLock::new(state),
        }
    }

    pub fn is_enabled(&self, name: &str) -> bool {
        self.read().flags.get(name).copied().unwrap_or(false)
    }

    pub fn all_flags(&self) -> HashMap<String, bool> {
        self.read().flags.clone()
    }

    pub fn all_names(&self) -> HashSet<String> {
        self.read().names.clone()
    }

    pub fn len(&self) -> usize {
        self.read().flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sets `name` to `enabled`, adding it if the provider never reported it.
    pub fn override_flag(&self, name: &str, enabled: bool) {
        let mut state = self.write();
        state.flags.insert(name.to_owned(), enabled);
        state.names.insert(name.to_owned());
    }

    // Both mutations happen under one guard, a poisoned lock still holds a consistent state.
    fn read(&self) -> RwLockReadGuard<'_, FlagState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, FlagState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}
