// ABOUTME: DNS-compatible application name validation.
// ABOUTME: Ensures app names follow RFC 1123 label requirements, leaving room for slot suffixes.

use std::fmt;
use thiserror::Error;

/// Longest suffix the strategies append (`-canary`).
const SUFFIX_RESERVE: usize = 7;
const MAX_LEN: usize = 63 - SUFFIX_RESERVE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppNameError {
    #[error("app name cannot be empty")]
    Empty,

    #[error("app name exceeds maximum length of {MAX_LEN} characters")]
    TooLong,

    #[error("app name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("app name cannot end with a hyphen")]
    EndsWithHyphen,

    #[error("app name must be lowercase")]
    NotLowercase,

    #[error("invalid character in app name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AppName(String);

impl AppName {
    pub fn new(value: &str) -> Result<Self, AppNameError> {
        if value.is_empty() {
            return Err(AppNameError::Empty);
        }

        if value.len() > MAX_LEN {
            return Err(AppNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(AppNameError::StartsWithHyphen);
        }

        if value.ends_with('-') {
            return Err(AppNameError::EndsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(AppNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
                return Err(AppNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of a deployment slot derived from this app, e.g. `shop-green`.
    pub fn slot(&self, suffix: &str) -> String {
        format!("{}-{}", self.0, suffix)
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_dns_label() {
        assert_eq!(AppName::new("checkout-api").unwrap().as_str(), "checkout-api");
    }

    #[test]
    fn rejects_uppercase_and_symbols() {
        assert_eq!(AppName::new("Shop"), Err(AppNameError::NotLowercase));
        assert_eq!(AppName::new("shop_api"), Err(AppNameError::InvalidChar('_')));
        assert_eq!(AppName::new("-shop"), Err(AppNameError::StartsWithHyphen));
    }

    #[test]
    fn leaves_room_for_slot_suffix() {
        let longest = "a".repeat(MAX_LEN);
        let name = AppName::new(&longest).unwrap();
        assert_eq!(name.slot("canary").len(), 63);
        assert_eq!(AppName::new(&"a".repeat(MAX_LEN + 1)), Err(AppNameError::TooLong));
    }
}
