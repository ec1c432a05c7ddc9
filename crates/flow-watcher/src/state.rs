use dashmap::DashMap;
use flow_core::Observation;
use serde::Serialize;

use crate::poller::PollPhase;
use crate::registry::SourceRegistry;

/// An operator-staged change, consumed by the next poll of its source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingChange {
    /// Treated as the next observation; notifies like any other change.
    Override(Observation),
    /// Becomes the last-known state without notifying.
    Replace(Observation),
}

#[derive(Debug, Clone, Default)]
pub struct SourceState {
    /// `None` until the first valid observation.
    pub last: Option<Observation>,
    pub pending: Option<PendingChange>,
    pub phase: PollPhase,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceSnapshot {
    pub ticker: String,
    pub last: Option<Observation>,
    pub pending: Option<PendingChange>,
    pub phase: PollPhase,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unknown source: {0}")]
    UnknownSource(String),
}

/// Last-known state of every watched source.
///
/// `last` and `phase` are written only by the source's own polling task;
/// `pending` is also written by the override intake. Each entry is guarded by
/// its shard lock, so staging and take-and-clear never interleave.
pub struct SourceStateStore {
    states: DashMap<String, SourceState>,
}

impl SourceStateStore {
    pub fn new(registry: &SourceRegistry) -> Self {
        let states = DashMap::new();
        for source in registry.iter() {
            states.insert(source.ticker.clone(), SourceState::default());
        }
        Self { states }
    }

    pub fn contains(&self, ticker: &str) -> bool {
        self.states.contains_key(ticker)
    }

    pub fn last(&self, ticker: &str) -> Option<Observation> {
        self.states.get(ticker).and_then(|s| s.last)
    }

    pub fn set_last(&self, ticker: &str, observation: Observation) {
        if let Some(mut state) = self.states.get_mut(ticker) {
            state.last = Some(observation);
        }
    }

    pub fn phase(&self, ticker: &str) -> Option<PollPhase> {
        self.states.get(ticker).map(|s| s.phase)
    }

    pub fn set_phase(&self, ticker: &str, phase: PollPhase) {
        if let Some(mut state) = self.states.get_mut(ticker) {
            state.phase = phase;
        }
    }

    /// Stage a change for the next poll. A change already pending is replaced
    /// and returned.
    pub fn stage(
        &self,
        ticker: &str,
        change: PendingChange,
    ) -> Result<Option<PendingChange>, StoreError> {
        let mut state = self
            .states
            .get_mut(ticker)
            .ok_or_else(|| StoreError::UnknownSource(ticker.to_string()))?;
        Ok(state.pending.replace(change))
    }

    /// Read and clear the pending change in one step.
    pub fn take_pending(&self, ticker: &str) -> Option<PendingChange> {
        self.states
            .get_mut(ticker)
            .and_then(|mut state| state.pending.take())
    }

    pub fn snapshot(&self) -> Vec<SourceSnapshot> {
        let mut snapshots: Vec<SourceSnapshot> = self
            .states
            .iter()
            .map(|entry| SourceSnapshot {
                ticker: entry.key().clone(),
                last: entry.last,
                pending: entry.pending,
                phase: entry.phase,
            })
            .collect();
        snapshots.sort_by(|a, b| a.ticker.cmp(&b.ticker));
        snapshots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SourceStateStore {
        SourceStateStore::new(&SourceRegistry::standard())
    }

    #[test]
    fn test_new_store_is_uninitialized() {
        let store = store();

        assert!(store.contains("GBTC"));
        assert!(store.last("GBTC").is_none());
        assert_eq!(store.phase("GBTC"), Some(PollPhase::Polling));
        assert!(!store.contains("NOPE"));
    }

    #[test]
    fn test_stage_and_take_once() {
        let store = store();
        let change = PendingChange::Override(Observation::undated(500.0));

        assert!(store.stage("IBIT", change).unwrap().is_none());
        assert_eq!(store.take_pending("IBIT"), Some(change));
        assert_eq!(store.take_pending("IBIT"), None);
    }

    #[test]
    fn test_last_write_wins() {
        let store = store();
        let first = PendingChange::Override(Observation::undated(500.0));
        let second = PendingChange::Replace(Observation::undated(600.0));

        store.stage("IBIT", first).unwrap();
        assert_eq!(store.stage("IBIT", second).unwrap(), Some(first));
        assert_eq!(store.take_pending("IBIT"), Some(second));
    }

    #[test]
    fn test_stage_unknown_source() {
        let store = store();
        let change = PendingChange::Override(Observation::undated(1.0));
        assert!(matches!(
            store.stage("NOPE", change),
            Err(StoreError::UnknownSource(_))
        ));
    }

    #[test]
    fn test_snapshot_sorted() {
        let store = store();
        store.set_last("IBIT", Observation::undated(10.0));

        let snapshot = store.snapshot();
        let tickers: Vec<&str> = snapshot.iter().map(|s| s.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["ARKB", "BITB", "BRRR", "GBTC", "IBIT"]);
        assert_eq!(snapshot[4].last, Some(Observation::undated(10.0)));
    }
}
