//! Structural diff between two checkpoints' state maps.

use crate::checkpoint::Checkpoint;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangedValue {
    pub before: Value,
    pub after: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StateDiff {
    pub added: HashMap<String, Value>,
    pub removed: HashMap<String, Value>,
    pub changed: HashMap<String, ChangedValue>,
}

/// Computes the added/removed/changed keys between `from` and `to`.
pub fn compare(from: &Checkpoint, to: &Checkpoint) -> StateDiff {
    let mut diff = StateDiff::default();

    for (key, to_value) in &to.state {
        match from.state.get(key) {
            None => {
                diff.added.insert(key.clone(), to_value.clone());
            }
            Some(from_value) if from_value != to_value => {
                diff.changed.insert(
                    key.clone(),
                    ChangedValue {
                        before: from_value.clone(),
                        after: to_value.clone(),
                    },
                );
            }
            _ => {}
        }
    }

    for (key, from_value) in &from.state {
        if !to.state.contains_key(key) {
            diff.removed.insert(key.clone(), from_value.clone());
        }
    }

    diff
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::CheckpointMetadata;

    fn cp(version: u64, state: &[(&str, Value)]) -> Checkpoint {
        Checkpoint::new(
            "thread-1",
            version,
            None,
            state.iter().map(|(k, v)| (k.to_string(), v.clone())).collect(),
            CheckpointMetadata::default(),
        )
    }

    #[test]
    fn compare_detects_added_changed_and_unchanged_keys() {
        let v1 = cp(1, &[("x", Value::from(1)), ("y", Value::from(2))]);
        let v2 = cp(
            2,
            &[
                ("x", Value::from(1)),
                ("y", Value::from(3)),
                ("z", Value::from(4)),
            ],
        );
        let diff = compare(&v1, &v2);
        assert_eq!(diff.added.get("z"), Some(&Value::from(4)));
        assert_eq!(
            diff.changed.get("y"),
            Some(&ChangedValue {
                before: Value::from(2),
                after: Value::from(3),
            })
        );
        assert!(diff.removed.is_empty());
    }
}
