// src/engine/results.rs

//! Copy-on-write result store shared with producers and gates.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use tracing::warn;

use crate::engine::{UnitId, UnitValue};

/// Read-only view of the values produced by units that reached `success`.
///
/// Cloning is cheap (one `Arc` bump). Each producer receives the snapshot
/// taken when its wave started; values produced during a wave are merged by
/// the orchestrator only after the whole wave has finished. If a producer
/// still holds an old snapshot at that point, the merge copies the map
/// instead of mutating the shared one.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Results {
    inner: Arc<HashMap<UnitId, UnitValue>>,
}

impl Results {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value produced by `id`, or `None` if that unit has not succeeded.
    pub fn get(&self, id: &str) -> Option<&UnitValue> {
        self.inner.get(id)
    }

    /// Deserialize the value produced by `id` into `T`.
    ///
    /// Returns `None` if the unit has not succeeded or its value does not
    /// have the shape of `T`.
    pub fn get_as<T: DeserializeOwned>(&self, id: &str) -> Option<T> {
        let value = self.inner.get(id)?;
        match serde_json::from_value(value.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(unit = %id, error = %e, "unit result does not match requested type");
                None
            }
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UnitValue)> {
        self.inner.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// JSON object holding the values of the given units that have
    /// succeeded. Missing units are left out.
    pub fn subset<'a, I>(&self, ids: I) -> serde_json::Map<String, UnitValue>
    where
        I: IntoIterator<Item = &'a UnitId>,
    {
        ids.into_iter()
            .filter_map(|id| self.inner.get(id).map(|v| (id.clone(), v.clone())))
            .collect()
    }

    /// Store a unit's value. Write-once: a second write for the same unit is
    /// ignored and returns `false`.
    pub(crate) fn insert(&mut self, id: UnitId, value: UnitValue) -> bool {
        if self.inner.contains_key(&id) {
            warn!(unit = %id, "result already stored; ignoring second write");
            return false;
        }
        Arc::make_mut(&mut self.inner).insert(id, value);
        true
    }
}

impl FromIterator<(UnitId, UnitValue)> for Results {
    fn from_iter<I: IntoIterator<Item = (UnitId, UnitValue)>>(iter: I) -> Self {
        Self {
            inner: Arc::new(iter.into_iter().collect()),
        }
    }
}

impl Serialize for Results {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.inner.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn writes_are_once_per_unit() {
        let mut r = Results::new();
        assert!(r.insert("A".into(), json!(1)));
        assert!(!r.insert("A".into(), json!(2)));
        assert_eq!(r.get("A"), Some(&json!(1)));
    }

    #[test]
    fn snapshots_do_not_see_later_writes() {
        let mut r = Results::new();
        r.insert("A".into(), json!(1));
        let snapshot = r.clone();

        r.insert("B".into(), json!(2));
        assert!(!snapshot.contains("B"));
        assert!(r.contains("B"));
    }

    #[test]
    fn typed_access_and_subset() {
        let r: Results = [
            ("price".to_string(), json!(12.5)),
            ("name".to_string(), json!("ACME")),
        ]
        .into_iter()
        .collect();

        assert_eq!(r.get_as::<f64>("price"), Some(12.5));
        assert_eq!(r.get_as::<f64>("name"), None);

        let wanted = vec!["price".to_string(), "missing".to_string()];
        let subset = r.subset(&wanted);
        assert_eq!(subset.len(), 1);
        assert_eq!(subset["price"], json!(12.5));
    }
}
