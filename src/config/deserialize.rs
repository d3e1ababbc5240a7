// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles validated app names and non-empty scanner lists.

use nonempty::NonEmpty;
use serde::Deserialize;

use crate::types::AppName;

pub fn deserialize_app_name<'de, D>(deserializer: D) -> Result<AppName, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    AppName::new(&s).map_err(serde::de::Error::custom)
}

pub fn deserialize_scanners<'de, D>(deserializer: D) -> Result<NonEmpty<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    if let Some(blank) = values.iter().find(|name| name.trim().is_empty()) {
        return Err(serde::de::Error::custom(format!(
            "scanner name cannot be blank: '{blank}'"
        )));
    }
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("at least one scanner is required"))
}
