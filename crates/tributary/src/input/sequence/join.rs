//! Shard assignment and the per-pass join accumulator.

use std::hash::Hasher;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use siphasher::sip::SipHasher13;

use crate::config::MergeStrategy;

/// Map a join key to its owning shard.
///
/// Deterministic and stable for the lifetime of a run: the same key always
/// lands on the same shard regardless of pass number or record content.
pub(crate) fn shard(key: &str, iterations: u32) -> u32 {
    if iterations <= 1 {
        return 0;
    }
    // Fixed-key SipHash so the assignment is identical on every pass.
    let mut hasher = SipHasher13::new();
    hasher.write(key.as_bytes());
    (hasher.finish() % u64::from(iterations)) as u32
}

/// Key-to-entry table for the active shard of one pass.
///
/// Holds at most one entry per join key; colliding records merge into the
/// existing entry field by field. The join key field itself never collides:
/// it is stripped from incoming records once an entry exists, so the emitted
/// key stays scalar under every strategy.
pub(crate) struct JoinBuffer {
    strategy: MergeStrategy,
    id_path: String,
    entries: IndexMap<String, Map<String, Value>>,
}

impl JoinBuffer {
    pub(crate) fn new(strategy: MergeStrategy, id_path: impl Into<String>) -> Self {
        Self {
            strategy,
            id_path: id_path.into(),
            entries: IndexMap::new(),
        }
    }

    /// Number of accumulated entries.
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Merge a record's fields into the entry for `key`, creating the entry
    /// on first sight. Returns the merged entry.
    pub(crate) fn fold(
        &mut self,
        key: &str,
        mut incoming: Map<String, Value>,
    ) -> &Map<String, Value> {
        use indexmap::map::Entry;
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut slot) => {
                remove_path(&mut incoming, &self.id_path);
                merge_fields(slot.get_mut(), incoming, self.strategy);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(incoming),
        }
    }

    /// Remove and yield every accumulated entry (end-of-pass flush).
    pub(crate) fn drain(
        &mut self,
    ) -> impl Iterator<Item = (String, Map<String, Value>)> + '_ {
        self.entries.drain(..)
    }
}

/// Remove a dot-separated field path from a field map.
fn remove_path(fields: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            fields.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(nested)) = fields.get_mut(head) {
                remove_path(nested, rest);
            }
        }
    }
}

/// Merge `incoming` into `existing` field by field.
///
/// First writes set the field directly; only collisions consult the merge
/// strategy.
fn merge_fields(
    existing: &mut Map<String, Value>,
    incoming: Map<String, Value>,
    strategy: MergeStrategy,
) {
    for (name, incoming_value) in incoming {
        match existing.entry(name) {
            serde_json::map::Entry::Vacant(slot) => {
                slot.insert(incoming_value);
            }
            serde_json::map::Entry::Occupied(mut slot) => {
                merge_field(slot.get_mut(), incoming_value, strategy);
            }
        }
    }
}

/// Resolve one field collision.
///
/// Two structured values deep-merge by field name regardless of strategy;
/// everything else applies the configured strategy.
fn merge_field(existing: &mut Value, incoming: Value, strategy: MergeStrategy) {
    match (existing, incoming) {
        (Value::Object(existing), Value::Object(incoming)) => {
            merge_fields(existing, incoming, strategy);
        }
        (existing, incoming) => match strategy {
            MergeStrategy::Array => match existing {
                Value::Array(items) => items.push(incoming),
                _ => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, incoming]);
                }
            },
            MergeStrategy::Replace => *existing = incoming,
            MergeStrategy::Keep => {}
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[test]
    fn test_shard_is_deterministic() {
        for key in ["aaa", "bbb", "ccc", "0", "42"] {
            let first = shard(key, 5);
            for _ in 0..10 {
                assert_eq!(shard(key, 5), first);
            }
            assert!(first < 5);
        }
    }

    #[test]
    fn test_shard_single_iteration_keeps_everything() {
        for key in ["aaa", "bbb", "ccc"] {
            assert_eq!(shard(key, 1), 0);
        }
    }

    #[test]
    fn test_shard_covers_every_key_exactly_once() {
        // Every key belongs to exactly one shard; summing shard-local counts
        // over all passes recovers the full key set.
        let iterations = 4;
        let keys: Vec<String> = (0..100).map(|i| format!("key{i}")).collect();
        let mut seen = 0;
        for pass in 0..iterations {
            seen += keys.iter().filter(|k| shard(k, iterations) == pass).count();
        }
        assert_eq!(seen, keys.len());
    }

    #[test]
    fn test_first_write_bypasses_strategy() {
        let mut buffer = JoinBuffer::new(MergeStrategy::Keep, "id");
        let entry = buffer.fold("aaa", fields(json!({"name": "A"})));
        assert_eq!(entry, &fields(json!({"name": "A"})));
    }

    #[test]
    fn test_array_strategy_builds_then_appends() {
        let mut buffer = JoinBuffer::new(MergeStrategy::Array, "id");
        buffer.fold("aaa", fields(json!({"hobby": "x"})));
        buffer.fold("aaa", fields(json!({"hobby": "y"})));
        let entry = buffer.fold("aaa", fields(json!({"hobby": "z"})));
        assert_eq!(entry, &fields(json!({"hobby": ["x", "y", "z"]})));
    }

    #[test]
    fn test_replace_strategy_last_writer_wins() {
        let mut buffer = JoinBuffer::new(MergeStrategy::Replace, "id");
        buffer.fold("aaa", fields(json!({"hobby": "running", "age": "20"})));
        let entry = buffer.fold("aaa", fields(json!({"hobby": "gaming"})));
        assert_eq!(entry, &fields(json!({"hobby": "gaming", "age": "20"})));
    }

    #[test]
    fn test_keep_strategy_first_writer_wins() {
        let mut buffer = JoinBuffer::new(MergeStrategy::Keep, "id");
        buffer.fold("aaa", fields(json!({"hobby": "running"})));
        let entry = buffer.fold("aaa", fields(json!({"hobby": "gaming", "age": "20"})));
        assert_eq!(entry, &fields(json!({"hobby": "running", "age": "20"})));
    }

    #[test]
    fn test_structured_values_deep_merge_under_any_strategy() {
        for strategy in [
            MergeStrategy::Array,
            MergeStrategy::Replace,
            MergeStrategy::Keep,
        ] {
            let mut buffer = JoinBuffer::new(strategy, "id");
            buffer.fold("aaa", fields(json!({"stuff": {"first": "foo"}})));
            let entry = buffer.fold("aaa", fields(json!({"stuff": {"second": "baz"}})));
            assert_eq!(
                entry,
                &fields(json!({"stuff": {"first": "foo", "second": "baz"}})),
                "strategy {strategy:?}"
            );
        }
    }

    #[test]
    fn test_nested_scalar_collision_uses_strategy() {
        let mut buffer = JoinBuffer::new(MergeStrategy::Replace, "id");
        buffer.fold("aaa", fields(json!({"stuff": {"first": "foo"}})));
        let entry = buffer.fold("aaa", fields(json!({"stuff": {"first": "bar"}})));
        assert_eq!(entry, &fields(json!({"stuff": {"first": "bar"}})));
    }

    #[test]
    fn test_existing_array_value_appends() {
        let mut buffer = JoinBuffer::new(MergeStrategy::Array, "id");
        buffer.fold("aaa", fields(json!({"tags": ["x", "y"]})));
        let entry = buffer.fold("aaa", fields(json!({"tags": "z"})));
        assert_eq!(entry, &fields(json!({"tags": ["x", "y", "z"]})));
    }

    #[test]
    fn test_join_key_field_stays_scalar() {
        let mut buffer = JoinBuffer::new(MergeStrategy::Array, "id");
        buffer.fold("aaa", fields(json!({"id": "aaa", "name": "A"})));
        buffer.fold("aaa", fields(json!({"id": "aaa", "hobby": "x"})));
        let entry = buffer.fold("aaa", fields(json!({"id": "aaa", "hobby": "y"})));
        assert_eq!(
            entry,
            &fields(json!({"id": "aaa", "name": "A", "hobby": ["x", "y"]}))
        );
    }

    #[test]
    fn test_nested_join_key_stays_scalar() {
        let mut buffer = JoinBuffer::new(MergeStrategy::Array, "meta.id");
        buffer.fold("7", fields(json!({"meta": {"id": 7, "v": "a"}})));
        let entry = buffer.fold("7", fields(json!({"meta": {"id": 7, "v": "b"}})));
        assert_eq!(
            entry,
            &fields(json!({"meta": {"id": 7, "v": ["a", "b"]}}))
        );
    }

    #[test]
    fn test_drain_empties_buffer() {
        let mut buffer = JoinBuffer::new(MergeStrategy::Array, "id");
        buffer.fold("aaa", fields(json!({"a": 1})));
        buffer.fold("bbb", fields(json!({"b": 2})));

        let drained: Vec<String> = buffer.drain().map(|(key, _)| key).collect();
        assert_eq!(drained, ["aaa", "bbb"]);
        assert_eq!(buffer.len(), 0);
    }
}
