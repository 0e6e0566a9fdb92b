use serde::Serialize;

/// Serialize `value` to canonical JSON bytes.
///
/// Normalization goes through `serde_json::Value`, whose object
/// representation is a `BTreeMap`, so keys come out ASCII-sorted at every
/// nesting level. Arrays keep their insertion order.
pub fn to_canonical_json<T: Serialize>(value: &T) -> anyhow::Result<Vec<u8>> {
    let normalized = serde_json::to_value(value)?;
    Ok(serde_json::to_vec(&normalized)?)
}
