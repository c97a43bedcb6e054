//! Required display names for categories and subcategories.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when validating a [`RequiredName`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NameError {
    /// The input is empty or only whitespace.
    #[error("name cannot be blank")]
    Blank,
}

/// A name that is not blank.
///
/// Validation looks at the trimmed input, but the stored value is the
/// literal input: `"  Rings "` stays `"  Rings "`.
///
/// ## Examples
///
/// ```
/// use gem_catalog_core::RequiredName;
///
/// assert!(RequiredName::parse("Rings").is_ok());
/// assert_eq!(RequiredName::parse(" Rings ").map(|n| n.into_inner()).ok(), Some(" Rings ".to_string()));
///
/// assert!(RequiredName::parse("").is_err());
/// assert!(RequiredName::parse("   ").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct RequiredName(String);

impl RequiredName {
    /// Validate a name.
    ///
    /// # Errors
    ///
    /// Returns [`NameError::Blank`] if the input is empty after trimming.
    pub fn parse(s: &str) -> Result<Self, NameError> {
        if s.trim().is_empty() {
            return Err(NameError::Blank);
        }
        Ok(Self(s.to_owned()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the `RequiredName` and returns its inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for RequiredName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for RequiredName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_inputs_rejected() {
        for input in ["", " ", "\t\n", "     "] {
            assert_eq!(RequiredName::parse(input), Err(NameError::Blank), "{input:?}");
        }
    }

    #[test]
    fn test_literal_value_preserved() {
        let name = RequiredName::parse("  Gold Rings  ");
        assert_eq!(name.map(RequiredName::into_inner), Ok("  Gold Rings  ".to_string()));
    }
}
