//! Validated text primitives shared by the flow crates.
//!
//! Anything that reaches the flow store from a caller (names, actions, departments, results)
//! is wrapped in one of these types first, so misuse is rejected before any mutation runs.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input was not a plausible email address
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
}

/// Caller-supplied text with surrounding whitespace removed and at least one character left.
///
/// Persisted as a plain JSON string; a blank string in stored data fails to deserialize.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Trims `input`, rejecting it with [`TextError::Empty`] if nothing is left.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        match input.as_ref().trim() {
            "" => Err(TextError::Empty),
            trimmed => Ok(Self(trimmed.to_owned())),
        }
    }

    /// Blank or missing input becomes `None`. Used for optional notes.
    pub fn optional(input: Option<impl AsRef<str>>) -> Option<Self> {
        input.and_then(|s| Self::new(s).ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for NonEmptyText {
    type Error = TextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<NonEmptyText> for String {
    fn from(text: NonEmptyText) -> Self {
        text.0
    }
}

impl std::fmt::Display for NonEmptyText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NonEmptyText {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A syntactically plausible email address.
///
/// Only a light check is applied: a single `@` with non-empty local and domain parts, a dot in
/// the domain, and no whitespace. Deliverability is not this type's concern.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmailAddress(String);

impl EmailAddress {
    /// Parses and trims an email address.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::Empty`] for blank input and [`TextError::InvalidEmail`] when the
    /// address does not have the expected `local@domain.tld` shape.
    pub fn parse(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }

        let valid = match trimmed.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
                    && !trimmed.chars().any(char::is_whitespace)
            }
            None => false,
        };

        if !valid {
            return Err(TextError::InvalidEmail(trimmed.to_owned()));
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EmailAddress {
    type Error = TextError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EmailAddress> for String {
    fn from(email: EmailAddress) -> Self {
        email.0
    }
}

impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_input() {
        let text = NonEmptyText::new("  Jane Doe \n").unwrap();
        assert_eq!(text.as_str(), "Jane Doe");
    }

    #[test]
    fn non_empty_text_rejects_whitespace() {
        assert_eq!(NonEmptyText::new("   ").unwrap_err(), TextError::Empty);
        assert_eq!(NonEmptyText::new("").unwrap_err(), TextError::Empty);
    }

    #[test]
    fn optional_maps_blank_to_none() {
        assert_eq!(NonEmptyText::optional(Some("  ")), None);
        assert_eq!(NonEmptyText::optional(None::<&str>), None);
        assert_eq!(
            NonEmptyText::optional(Some("fasting required")),
            Some(NonEmptyText::new("fasting required").unwrap())
        );
    }

    #[test]
    fn non_empty_text_deserialize_rejects_blank() {
        let err = serde_json::from_str::<NonEmptyText>("\"  \"");
        assert!(err.is_err());
    }

    #[test]
    fn stored_text_is_a_plain_json_string() {
        let text = NonEmptyText::new("Cardiology").unwrap();
        assert_eq!(serde_json::to_string(&text).unwrap(), "\"Cardiology\"");

        let email: EmailAddress = serde_json::from_str("\"jane@example.com\"").unwrap();
        assert_eq!(email.as_str(), "jane@example.com");
        assert!(serde_json::from_str::<EmailAddress>("\"not-an-email\"").is_err());
    }

    #[test]
    fn email_accepts_plain_address() {
        let email = EmailAddress::parse(" jane@example.com ").unwrap();
        assert_eq!(email.as_str(), "jane@example.com");
    }

    #[test]
    fn email_rejects_malformed_addresses() {
        for bad in ["jane", "jane@", "@example.com", "jane@example", "ja ne@example.com", "a@b@c.com"] {
            assert!(
                matches!(EmailAddress::parse(bad), Err(TextError::InvalidEmail(_))),
                "{bad} should be rejected"
            );
        }
        assert_eq!(EmailAddress::parse(" ").unwrap_err(), TextError::Empty);
    }
}
