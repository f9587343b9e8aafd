//! Provide a request-scoped [`Context`] to resolvers and directives.
//!
//! The context holds a DashMap of JSON entries shared by every resolver of one
//! execution, plus an optional deadline used for cooperative cancellation.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::time::Instant;

use crate::error::BoxError;
use crate::json_ext::Value;

/// Holds [`Context`] entries.
pub(crate) type Entries = Arc<DashMap<String, Value>>;

/// Context for one execution.
///
/// Cloning is cheap and clones share their entries.
#[derive(Clone, Debug, Default)]
pub struct Context {
    entries: Entries,
    deadline: Option<Instant>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolvers scheduled after `deadline` are not invoked; their fields fail with a
    /// timeout error.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        self.deadline
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads and deserializes the entry under `key`.
    pub fn get<K, V>(&self, key: K) -> Result<Option<V>, BoxError>
    where
        K: Into<String>,
        V: DeserializeOwned,
    {
        let Some(entry) = self.entries.get(&key.into()) else {
            return Ok(None);
        };
        Ok(Some(serde_json_bytes::from_value(entry.value().clone())?))
    }

    /// Stores `value` under `key` and returns the entry it replaced.
    pub fn insert<K, V>(&self, key: K, value: V) -> Result<Option<V>, BoxError>
    where
        K: Into<String>,
        V: DeserializeOwned + Serialize,
    {
        let value = serde_json_bytes::to_value(value)?;
        match self.entries.insert(key.into(), value) {
            Some(previous) => Ok(Some(serde_json_bytes::from_value(previous)?)),
            None => Ok(None),
        }
    }

    /// Applies `update` to the entry under `key`, starting from `default()` when
    /// there is none. The entry stays locked while `update` runs.
    pub fn upsert<K, V>(
        &self,
        key: K,
        update: impl FnOnce(V) -> V,
        default: impl FnOnce() -> V,
    ) -> Result<(), BoxError>
    where
        K: Into<String>,
        V: DeserializeOwned + Serialize,
    {
        match self.entries.entry(key.into()) {
            Entry::Occupied(mut entry) => {
                let current = serde_json_bytes::from_value(entry.get().clone())?;
                entry.insert(serde_json_bytes::to_value(update(current))?);
            }
            Entry::Vacant(entry) => {
                entry.insert(serde_json_bytes::to_value(update(default()))?);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[test]
    fn entries_round_trip_through_serde() {
        let c = Context::new();
        assert!(c.insert("key1", 1).is_ok());
        assert_eq!(c.get("key1").unwrap(), Some(1));
        assert!(!c.is_empty());
    }

    #[test]
    fn insert_returns_the_replaced_entry() {
        let c = Context::new();
        assert!(c.insert("overwrite", 2).is_ok());
        assert_eq!(c.insert("overwrite", 3).unwrap(), Some(2));
        assert_eq!(c.get("overwrite").unwrap(), Some(3));
    }

    #[test]
    fn upsert_starts_from_the_default() {
        let c = Context::new();
        assert!(c.insert("present", 1).is_ok());
        assert!(c.upsert("present", |v: i32| v + 1, || 0).is_ok());
        assert_eq!(c.get("present").unwrap(), Some(2));
        assert!(c.upsert("not_present", |v: i32| v + 1, || 0).is_ok());
        assert_eq!(c.get("not_present").unwrap(), Some(1));
    }

    #[test]
    fn upsert_rejects_entries_of_another_type() {
        let c = Context::new();
        assert!(c.insert("string", "Some value".to_string()).is_ok());
        assert!(c.upsert("string", |v: i32| v + 1, || 0).is_err());
        assert_eq!(c.get("string").unwrap(), Some("Some value".to_string()));
    }

    #[test]
    fn clones_share_entries() {
        let c = Context::new();
        let clone = c.clone();
        clone.insert("shared", true).unwrap();
        assert_eq!(c.get("shared").unwrap(), Some(true));
    }

    #[tokio::test]
    async fn deadline() {
        let c = Context::new();
        assert!(!c.is_expired());
        let c = c.with_deadline(Instant::now() - Duration::from_millis(1));
        assert!(c.is_expired());
        let c = Context::new().with_timeout(Duration::from_secs(60));
        assert!(!c.is_expired());
    }
}
