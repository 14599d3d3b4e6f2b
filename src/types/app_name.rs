// ABOUTME: DNS-compatible application name validation.
// ABOUTME: App names become service, image and host names, so they follow RFC 1123 labels.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppNameError {
    #[error("app name cannot be empty")]
    Empty,

    #[error("app name exceeds maximum length of 50 characters")]
    TooLong,

    #[error("app name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("app name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("app name cannot contain consecutive hyphens")]
    DoubleHyphen,

    #[error("app name must be lowercase")]
    NotLowercase,

    #[error("invalid character in app name: '{0}'")]
    InvalidChar(char),
}

/// Validated application name.
///
/// Shorter than a full DNS label because it is embedded in service names
/// (`srv-<namespace>--<app>`) which must themselves stay under 63 characters.
/// Double hyphens are reserved as the namespace separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppName(String);

impl AppName {
    pub fn new(value: &str) -> Result<Self, AppNameError> {
        validate_label(value)?;
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub(super) fn validate_label(value: &str) -> Result<(), AppNameError> {
    if value.is_empty() {
        return Err(AppNameError::Empty);
    }

    if value.len() > 50 {
        return Err(AppNameError::TooLong);
    }

    if value.starts_with('-') {
        return Err(AppNameError::StartsWithHyphen);
    }

    if value.ends_with('-') {
        return Err(AppNameError::EndsWithHyphen);
    }

    if value.contains("--") {
        return Err(AppNameError::DoubleHyphen);
    }

    for c in value.chars() {
        if c.is_ascii_uppercase() {
            return Err(AppNameError::NotLowercase);
        }
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
            return Err(AppNameError::InvalidChar(c));
        }
    }

    Ok(())
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for AppName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AppName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        AppName::new(&value).map_err(serde::de::Error::custom)
    }
}
