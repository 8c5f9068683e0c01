//! Map construction helpers.
//!
//! All string-keyed maps in the engine use `FxHashMap`; these helpers
//! keep call sites free of hasher type noise.

use rustc_hash::FxHashMap;
use serde_json::Value;

/// New empty map for context / response-data / params channels.
#[must_use]
pub fn new_context_map() -> FxHashMap<String, Value> {
    FxHashMap::default()
}

/// Build a context map from key/value pairs.
///
/// # Examples
///
/// ```
/// use dispatchflow::utils::collections::context_map;
/// use serde_json::json;
///
/// let map = context_map([("count", json!(20)), ("region", json!("north"))]);
/// assert_eq!(map.len(), 2);
/// ```
#[must_use]
pub fn context_map<K: Into<String>>(
    entries: impl IntoIterator<Item = (K, Value)>,
) -> FxHashMap<String, Value> {
    entries
        .into_iter()
        .map(|(k, v)| (k.into(), v))
        .collect()
}
