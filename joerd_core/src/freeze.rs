//! Canonical serialization of a nested JSON-shaped value, used to group
//! render jobs that share an identical `sources` value (§4.6, §9 "Frozen/
//! thawed nested values as map keys"). The original implementation converts
//! dicts to `frozenset`-of-tuples and lists to tuples so the result can be
//! used as a hashable map key; Rust has no equivalent mutable/hashable split
//! to work around, so this freezes to a canonical JSON string instead,
//! sorted on object keys so that two structurally-equal values always
//! produce the same string regardless of field insertion order.

use anyhow::{Context, Result};
use serde_json::Value;

/// A canonical string form of `value`, suitable as a `HashMap` key. Object
/// keys are sorted (`serde_json::Value`'s `Map` is a `BTreeMap` by default,
/// without the `preserve_order` feature, so `to_string` already emits them
/// in sorted order); array order is preserved, since array order is
/// semantically significant for `vrts_for` groups.
pub fn freeze(value: &Value) -> String {
	// `Value`'s default Debug/Display-adjacent serialization already walks
	// the BTreeMap in key order; `to_string` is therefore already canonical.
	serde_json::to_string(value).expect("serde_json::Value always serializes")
}

/// Inverse of [`freeze`]: parses the canonical string back into a `Value`.
pub fn thaw(frozen: &str) -> Result<Value> {
	serde_json::from_str(frozen).context("failed to thaw a frozen sources key")
}
