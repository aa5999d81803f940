//! Structural query keys.

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::warn;

/// Identifier for a unit of cached server data.
///
/// A key is an ordered list of JSON segments, e.g. `["accountPolicies", "A1"]`
/// or `["accounts", {"page": 1, "search": "ab"}]`. Segments are canonicalized
/// on insertion (object members sorted, `null` members dropped), so two keys
/// are equal exactly when their serialized forms match.
///
/// Keys are values: "changing" a filter means building a new key.
#[derive(Clone)]
pub struct QueryKey {
  segments: Vec<Value>,
  /// Serialized form of each segment, used for equality, hashing and prefix matching
  serialized: Vec<String>,
}

/// Build a [`QueryKey`] from a root name and any number of serializable segments.
///
/// ```ignore
/// let key = query_key!["accountPolicies", account_id];
/// ```
#[macro_export]
macro_rules! query_key {
  ($root:expr $(, $segment:expr)* $(,)?) => {
    $crate::cache::QueryKey::new($root)$(.with($segment))*
  };
}

impl QueryKey {
  /// Create a key with a single root segment.
  pub fn new(root: &str) -> Self {
    let root = Value::String(root.to_string());
    Self {
      serialized: vec![root.to_string()],
      segments: vec![root],
    }
  }

  /// Append a segment.
  ///
  /// A segment that cannot be represented as JSON is replaced by a marker
  /// naming its type, so it never collapses into a plain `null` segment.
  pub fn with<S: Serialize>(mut self, segment: S) -> Self {
    let value = serde_json::to_value(&segment).unwrap_or_else(|e| {
      let type_name = std::any::type_name::<S>();
      warn!(error = %e, segment = type_name, "query key segment is not representable as JSON");
      Value::String(format!("<unserializable {}>", type_name))
    });
    let value = canonicalize(value);
    self.serialized.push(value.to_string());
    self.segments.push(value);
    self
  }

  pub fn segments(&self) -> &[Value] {
    &self.segments
  }

  /// The first segment when it is a string (the resource name).
  pub fn root(&self) -> Option<&str> {
    self.segments.first().and_then(Value::as_str)
  }

  pub fn len(&self) -> usize {
    self.segments.len()
  }

  pub fn is_empty(&self) -> bool {
    self.segments.is_empty()
  }

  /// True when `prefix` equals this key or this key extends it segment by segment.
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    prefix.serialized.len() <= self.serialized.len()
      && self.serialized[..prefix.serialized.len()] == prefix.serialized[..]
  }

  /// Stable fixed-length hash of the serialized key.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.to_string().as_bytes());
    hex::encode(hasher.finalize())
  }

  /// First 12 hex digits of [`cache_hash`](Self::cache_hash). Filter keys get
  /// long, so fetch spans carry this to correlate log lines for one key.
  pub fn short_hash(&self) -> String {
    let mut hash = self.cache_hash();
    hash.truncate(12);
    hash
  }
}

/// Sort object members and drop explicit nulls so equal filters serialize equally.
fn canonicalize(value: Value) -> Value {
  match value {
    Value::Object(map) => {
      let mut members: Vec<(String, Value)> = map
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k, canonicalize(v)))
        .collect();
      members.sort_by(|a, b| a.0.cmp(&b.0));
      Value::Object(members.into_iter().collect::<Map<String, Value>>())
    }
    Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
    other => other,
  }
}

impl PartialEq for QueryKey {
  fn eq(&self, other: &Self) -> bool {
    self.serialized == other.serialized
  }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.serialized.hash(state);
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "[{}]", self.serialized.join(","))
  }
}

impl fmt::Debug for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "QueryKey{}", self)
  }
}

impl Serialize for QueryKey {
  fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    self.segments.serialize(serializer)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_member_order_does_not_matter() {
    let a = query_key!["accounts", json!({"search": "ab", "page": 1})];
    let b = query_key!["accounts", json!({"page": 1, "search": "ab"})];
    assert_eq!(a, b);
    assert_eq!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn test_null_members_are_dropped() {
    let a = query_key!["accounts", json!({"page": 1, "status": null})];
    let b = query_key!["accounts", json!({"page": 1})];
    assert_eq!(a, b);
  }

  #[test]
  fn test_changed_filter_is_a_different_key() {
    let a = query_key!["accounts", json!({"search": "a"})];
    let ab = query_key!["accounts", json!({"search": "ab"})];
    assert_ne!(a, ab);
  }

  #[test]
  fn test_prefix_matching() {
    let key = query_key!["accountPolicies", "A1"];

    assert!(key.starts_with(&query_key!["accountPolicies"]));
    assert!(key.starts_with(&query_key!["accountPolicies", "A1"]));
    assert!(!key.starts_with(&query_key!["accountPolicies", "A2"]));
    assert!(!key.starts_with(&query_key!["accountPolicies", "A1", "extra"]));
    // A root that merely shares leading characters is not a prefix
    assert!(!query_key!["policiesArchive"].starts_with(&query_key!["policies"]));
  }

  #[test]
  fn test_short_hash_is_a_prefix_of_the_full_hash() {
    let key = query_key!["accountPolicies", "A1"];
    let short = key.short_hash();
    assert_eq!(short.len(), 12);
    assert!(key.cache_hash().starts_with(&short));
    assert_ne!(short, query_key!["accountPolicies", "A2"].short_hash());
  }

  #[test]
  fn test_unserializable_segments_do_not_collide() {
    use std::collections::BTreeMap;
    // JSON object keys must be strings
    let by_bytes = BTreeMap::from([(vec![1u8], 1u8)]);
    let by_pair = BTreeMap::from([((1u8, 2u8), 1u8)]);

    let a = query_key!["accounts", by_bytes];
    let b = query_key!["accounts", by_pair];
    assert_ne!(a, b);
    assert_ne!(a, query_key!["accounts", Value::Null]);
  }

  #[test]
  fn test_display_is_serialized_form() {
    let key = query_key!["policies", 2, json!({"status": "Active"})];
    assert_eq!(key.to_string(), r#"["policies",2,{"status":"Active"}]"#);
    assert_eq!(key.root(), Some("policies"));
    assert_eq!(key.len(), 3);
  }
}
