use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key the sidecar requires on every event.
pub const EVENT_TYPE_KEY: &str = "eventType";
/// Conventional key listing the output files an event refers to,
/// comma-joined when there is more than one.
pub const FILES_KEY: &str = "files";

/// A single key/value pair as it appears on the wire:
/// `{"key": "...", "value": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    pub key: String,
    pub value: String,
}

/// An ordered sequence of key/value pairs.
///
/// This is the shape the sidecar uses for both event data and parent
/// metadata. Order is preserved; duplicate keys are allowed on the wire,
/// and lookups return the first match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyValuePairs(Vec<KeyValuePair>);

impl KeyValuePairs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a pair, keeping insertion order.
    pub fn push(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.push(KeyValuePair {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Replace the value of an existing key in place, or append.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        match self.0.iter_mut().find(|p| p.key == key) {
            Some(pair) => pair.value = value.into(),
            None => self.push(key, value),
        }
    }

    /// First value recorded under `key`, if any.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyValuePair> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<KeyValuePair>> for KeyValuePairs {
    fn from(pairs: Vec<KeyValuePair>) -> Self {
        Self(pairs)
    }
}

impl IntoIterator for KeyValuePairs {
    type Item = KeyValuePair;
    type IntoIter = std::vec::IntoIter<KeyValuePair>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A downstream-triggering event.
///
/// Serializes as its inner [`KeyValuePairs`]; the `eventType` key is
/// mandatory and sinks refuse to deliver events without it. Written once,
/// never mutated after publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Event(KeyValuePairs);

impl Event {
    pub fn new(event_type: impl Into<String>) -> Self {
        let mut pairs = KeyValuePairs::new();
        pairs.push(EVENT_TYPE_KEY, event_type);
        Self(pairs)
    }

    /// Build an event from raw pairs. Does not validate; sinks do.
    pub fn from_pairs(pairs: KeyValuePairs) -> Self {
        Self(pairs)
    }

    /// Reference an output file. Repeated calls comma-join, matching the
    /// sidecar's `files` convention.
    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        let file = file.into();
        match self.0.get(FILES_KEY) {
            Some(existing) => {
                let joined = format!("{existing},{file}");
                self.0.set(FILES_KEY, joined);
            }
            None => self.0.push(FILES_KEY, file),
        }
        self
    }

    /// Attach an arbitrary pair, replacing any existing value for `key`.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.set(key, value);
        self
    }

    pub fn event_type(&self) -> Option<&str> {
        self.0.get(EVENT_TYPE_KEY)
    }

    /// Files referenced by this event, split out of the comma-joined value.
    pub fn files(&self) -> Vec<&str> {
        self.0
            .get(FILES_KEY)
            .map(|v| v.split(',').filter(|s| !s.is_empty()).collect())
            .unwrap_or_default()
    }

    pub fn pairs(&self) -> &KeyValuePairs {
        &self.0
    }
}

/// Derived, structured knowledge about a module run.
///
/// One insight document per run, written to `out/meta.json`. A later write
/// replaces the whole document; there is no merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Insight(Map<String, Value>);

impl Insight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Reference assigned by the sidecar when a blob is pushed to the data
/// plane. The URI is what downstream metadata and events should carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub name: String,
    pub uri: String,
}
