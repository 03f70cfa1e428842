use reqwest::header::{HeaderMap, HeaderValue};
use serde::Serialize;
use thiserror::Error;

/// Header carrying the opaque Clockify API key.
pub const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    api_key: String,
}

#[derive(Error, Debug)]
pub enum IntoCredentialsError {
    #[error("Empty API key")]
    EmptyApiKey,
    #[error("API key contains non-header characters")]
    MalformedApiKey,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>) -> Result<Credentials, IntoCredentialsError> {
        let api_key = api_key.into();
        let trimmed = api_key.trim();
        if trimmed.is_empty() {
            return Err(IntoCredentialsError::EmptyApiKey);
        }
        if HeaderValue::from_str(trimmed).is_err() {
            return Err(IntoCredentialsError::MalformedApiKey);
        }

        Ok(Credentials {
            api_key: trimmed.to_string(),
        })
    }

    /// The key as sent upstream. Also used by callers as a rate-limit
    /// partition key, so it must be stable for the lifetime of the client.
    pub fn key(&self) -> &str {
        &self.api_key
    }

    pub fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        // Validity checked in `new`.
        if let Ok(value) = HeaderValue::from_str(&self.api_key) {
            headers.insert(API_KEY_HEADER, value);
        }
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_key() {
        assert!(matches!(
            Credentials::new("   "),
            Err(IntoCredentialsError::EmptyApiKey)
        ));
    }

    #[test]
    fn trims_and_keeps_key() {
        let creds = Credentials::new("  abc123  ").unwrap();
        assert_eq!(creds.key(), "abc123");
        assert_eq!(creds.auth_headers().get(API_KEY_HEADER).unwrap(), "abc123");
    }

    #[test]
    fn rejects_key_with_control_characters() {
        assert!(matches!(
            Credentials::new("abc\ndef"),
            Err(IntoCredentialsError::MalformedApiKey)
        ));
    }
}
