//! Serde helpers shared by request types.

use serde::{Deserialize, Deserializer};

/// Distinguish "field absent" (`None`) from "field is null" (`Some(None)`)
/// in partial updates.
///
/// Use with `#[serde(default, deserialize_with = "double_option")]`.
pub fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
