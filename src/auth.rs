//! Authentication
//!
//! Mailgun uses HTTP Basic auth with the fixed user `api` and the account
//! API key as password. The credential is synthesized once and sent as a
//! default header on every request.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use std::fmt;

/// Username Mailgun expects for key-based Basic auth
pub const API_USER: &str = "api";

/// Authentication configuration
#[derive(Clone, Default)]
pub enum AuthConfig {
    /// No authentication required
    #[default]
    None,

    /// HTTP Basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },
}

impl AuthConfig {
    /// Basic credential for a Mailgun API key
    pub fn api_key(key: impl Into<String>) -> Self {
        Self::Basic {
            username: API_USER.to_string(),
            password: key.into(),
        }
    }

    /// Value for the `Authorization` header, if any
    pub fn header_value(&self) -> Option<String> {
        match self {
            AuthConfig::None => None,
            AuthConfig::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{username}:{password}"));
                Some(format!("Basic {encoded}"))
            }
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::None => f.write_str("None"),
            AuthConfig::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
        }
    }
}

/// Mask a secret for display, keeping the last four characters
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "***".to_string();
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("***{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_key_header() {
        let auth = AuthConfig::api_key("key-123");
        let expected = format!("Basic {}", STANDARD.encode("api:key-123"));
        assert_eq!(auth.header_value(), Some(expected));
    }

    #[test]
    fn test_no_auth_header() {
        assert_eq!(AuthConfig::None.header_value(), None);
    }

    #[test]
    fn test_debug_hides_password() {
        let debug = format!("{:?}", AuthConfig::api_key("super-secret"));
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("api"));
    }

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret("key-abcdef1234"), "***1234");
        assert_eq!(mask_secret("abc"), "***");
    }
}
