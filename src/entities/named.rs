//! Person names shared by students and teachers.
//!
//! A valid name is non-empty after trimming and consists only of ASCII letters
//! and whitespace. Non-Latin names are rejected.

use super::Identified;
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Checks a raw name and returns its trimmed form.
///
/// # Errors
/// Returns [`Error::Validation`] if the trimmed name is empty or contains
/// anything other than ASCII letters and whitespace.
pub fn validate_name(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::validation("Name cannot be empty."));
    }
    if !trimmed
        .chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_whitespace())
    {
        return Err(Error::validation(
            "Name must contain only letters and spaces.",
        ));
    }
    Ok(trimmed.to_string())
}

/// A name that has passed [`validate_name`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PersonName(String);

impl PersonName {
    /// Validates and wraps a raw name.
    pub fn parse(raw: &str) -> Result<Self> {
        validate_name(raw).map(Self)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PersonName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<PersonName> for String {
    fn from(value: PersonName) -> Self {
        value.0
    }
}

impl fmt::Display for PersonName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability shared by students and teachers: an ID plus a validated name.
pub trait NamedEntity: Identified {
    fn name(&self) -> &str;

    fn set_name(&mut self, name: PersonName);

    /// Replaces the name after running the same validation as construction.
    ///
    /// # Errors
    /// Returns [`Error::Validation`] and leaves the entity untouched if the
    /// new name is invalid.
    fn rename(&mut self, raw: &str) -> Result<()> {
        let name = PersonName::parse(raw)?;
        self.set_name(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_valid_names_are_trimmed() {
        assert_eq!(validate_name("Alice").unwrap(), "Alice");
        assert_eq!(validate_name("  Mary Ann  ").unwrap(), "Mary Ann");
        assert_eq!(validate_name("Jean\tLuc").unwrap(), "Jean\tLuc");
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        for bad in ["", "   ", "R2D2", "O'Brien", "Anne-Marie", "Zoë", "李雷", "Bob!"] {
            let result = validate_name(bad);
            assert!(
                matches!(result, Err(Error::Validation { .. })),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_person_name_serde_validates() {
        let name: PersonName = serde_json::from_str("\" Bob \"").unwrap();
        assert_eq!(name.as_str(), "Bob");
        assert_eq!(serde_json::to_string(&name).unwrap(), "\"Bob\"");

        let bad = serde_json::from_str::<PersonName>("\"B0b\"");
        assert!(bad.is_err());
    }
}
