//! Recursive JSON merge.
//!
//! `deep_merge` combines two JSON objects with a fixed precedence:
//! values from the overlay win on conflict, nested objects merge
//! recursively, everything else (scalars, arrays, nulls) is atomic.
//! The utility is generic over any keyed JSON data, not tied to the
//! crawler's document shapes.

use serde_json::map::Entry;
use serde_json::{Map, Value};

/// Merge `overlay` into `base` in place.
///
/// For every key in `overlay`:
/// - both sides hold objects: merge recursively;
/// - otherwise: the overlay value replaces the base value.
///
/// Keys only present in `base` are kept untouched.
pub fn deep_merge(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, overlay_value) in overlay {
        match base.entry(key) {
            Entry::Occupied(mut occupied) => match (occupied.get_mut(), overlay_value) {
                (Value::Object(base_obj), Value::Object(overlay_obj)) => {
                    deep_merge(base_obj, overlay_obj);
                }
                (slot, overlay_value) => {
                    *slot = overlay_value;
                }
            },
            Entry::Vacant(vacant) => {
                vacant.insert(overlay_value);
            }
        }
    }
}
