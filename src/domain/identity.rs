use crate::error::{Result, WalletError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which delivery channel family an identity belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    Phone,
    Email,
}

/// Normalized phone number or e-mail address keying both OTP records and accounts.
///
/// Construction goes through [`IdentityKey::parse`], so every value held by the
/// rest of the crate is trimmed, lowercased, and shape-checked.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn parse(raw: &str) -> Result<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            return Err(WalletError::ValidationError(
                "Identity key is required".to_string(),
            ));
        }
        if is_mobile_number(&normalized) || is_email(&normalized) {
            Ok(Self(normalized))
        } else {
            Err(WalletError::ValidationError(
                "Enter a valid 10-digit mobile number or email address".to_string(),
            ))
        }
    }

    pub fn kind(&self) -> IdentityKind {
        if self.0.contains('@') {
            IdentityKind::Email
        } else {
            IdentityKind::Phone
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for IdentityKey {
    type Error = WalletError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<IdentityKey> for String {
    fn from(key: IdentityKey) -> Self {
        key.0
    }
}

fn is_mobile_number(s: &str) -> bool {
    s.len() == 10 && s.bytes().all(|b| b.is_ascii_digit())
}

fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || s.chars().any(char::is_whitespace) {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mobile_number_is_accepted() {
        let key = IdentityKey::parse(" 9876543210 ").unwrap();
        assert_eq!(key.as_str(), "9876543210");
        assert_eq!(key.kind(), IdentityKind::Phone);
    }

    #[test]
    fn test_email_is_normalized() {
        let key = IdentityKey::parse("  Player.One@Example.COM ").unwrap();
        assert_eq!(key.as_str(), "player.one@example.com");
        assert_eq!(key.kind(), IdentityKind::Email);
    }

    #[test]
    fn test_malformed_keys_are_rejected() {
        for raw in [
            "",
            "   ",
            "12345",
            "98765432101",
            "98765abcde",
            "user@",
            "@example.com",
            "user@example",
            "user@@example.com",
            "us er@example.com",
            "user@-bad.com",
            "user@example..com",
        ] {
            assert!(
                matches!(IdentityKey::parse(raw), Err(WalletError::ValidationError(_))),
                "{raw:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_deserialization_validates() {
        let ok: IdentityKey = serde_json::from_str("\"USER@example.com\"").unwrap();
        assert_eq!(ok.as_str(), "user@example.com");
        assert!(serde_json::from_str::<IdentityKey>("\"nope\"").is_err());
    }
}
