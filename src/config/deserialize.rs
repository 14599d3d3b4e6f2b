// ABOUTME: Custom serde deserializers for config types.
// ABOUTME: Handles non-empty command lines and optional paths given as empty strings.

use nonempty::NonEmpty;
use serde::Deserialize;
use std::path::PathBuf;

pub fn deserialize_command<'de, D>(deserializer: D) -> Result<NonEmpty<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Vec<String> = Vec::deserialize(deserializer)?;
    if values.iter().any(|v| v.trim().is_empty()) {
        return Err(serde::de::Error::custom("command arguments cannot be empty"));
    }
    NonEmpty::from_vec(values)
        .ok_or_else(|| serde::de::Error::custom("command needs at least one argument"))
}

/// `~` and empty strings both mean "not set".
pub fn deserialize_optional_path<'de, D>(deserializer: D) -> Result<Option<PathBuf>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt: Option<String> = Option::deserialize(deserializer)?;
    Ok(opt
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .map(PathBuf::from))
}
