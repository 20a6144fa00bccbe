//! Serde adapter that writes a string-keyed map as an ordered list of
//! `[key, value]` pairs and rebuilds the map on load.
use std::collections::BTreeMap;

use serde::ser::SerializeSeq;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub fn serialize<V, S>(map: &BTreeMap<String, V>, serializer: S) -> Result<S::Ok, S::Error>
where
    V: Serialize,
    S: Serializer,
{
    let mut seq = serializer.serialize_seq(Some(map.len()))?;
    for pair in map {
        seq.serialize_element(&pair)?;
    }
    seq.end()
}

pub fn deserialize<'de, V, D>(deserializer: D) -> Result<BTreeMap<String, V>, D::Error>
where
    V: Deserialize<'de>,
    D: Deserializer<'de>,
{
    let pairs: Vec<(String, V)> = Vec::deserialize(deserializer)?;
    Ok(pairs.into_iter().collect())
}
