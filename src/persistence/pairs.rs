//! Serde adapter storing a map as an ordered list of `[key, value]` pairs.
//!
//! Use with `#[serde(with = "crate::persistence::pairs")]` on a
//! `BTreeMap<String, V>` field. The stored shape is the list itself, so
//! non-string-friendly keys survive without re-encoding.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<S, V>(map: &BTreeMap<String, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    V: Serialize,
{
    let pairs: Vec<(&String, &V)> = map.iter().collect();
    pairs.serialize(serializer)
}

pub fn deserialize<'de, D, V>(deserializer: D) -> Result<BTreeMap<String, V>, D::Error>
where
    D: Deserializer<'de>,
    V: DeserializeOwned,
{
    let pairs: Vec<(String, V)> = Vec::deserialize(deserializer)?;
    Ok(pairs.into_iter().collect())
}
