//! Serde helpers for the loosely typed fields of the payload.

use serde::{Deserialize, Deserializer, Serializer};

/// Owner indices on column definitions use `-1` for "none".
pub mod owner_index {
    use super::*;

    pub fn serialize<T, S>(value: &Option<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Copy + Into<u32>,
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_i64(i64::from((*v).into())),
            None => serializer.serialize_i64(-1),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        T: From<u32>,
        D: Deserializer<'de>,
    {
        let raw = Option::<i64>::deserialize(deserializer)?;
        match raw {
            Some(v) if v >= 0 => u32::try_from(v)
                .map(|v| Some(T::from(v)))
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl Loose {
    fn into_string(self) -> String {
        match self {
            Loose::Text(s) => s,
            Loose::Number(n) => n.to_string(),
            Loose::Bool(b) => b.to_string(),
        }
    }
}

/// Accept a string, number, bool, or null as a string (null becomes empty).
pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Loose>::deserialize(deserializer)?
        .map(Loose::into_string)
        .unwrap_or_default())
}

/// Accept a string, number, or null as an optional string. Empty strings are `None`.
pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Loose>::deserialize(deserializer)?
        .map(Loose::into_string)
        .filter(|s| !s.trim().is_empty()))
}
