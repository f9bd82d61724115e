use super::identity::IdentityKey;
use crate::error::{Result, WalletError};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Validity window of an issued code.
pub const OTP_TTL_SECS: u64 = 5 * 60;
/// Failed verifications allowed before the record is discarded.
pub const OTP_MAX_ATTEMPTS: u32 = 3;
/// Number of digits in a code.
pub const OTP_LENGTH: usize = 6;
/// Code issued when mock mode is enabled. Never valid in production.
pub const MOCK_OTP_CODE: &str = "123456";

/// A six-digit numeric one-time code.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OtpCode(String);

impl OtpCode {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.len() == OTP_LENGTH && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(WalletError::ValidationError(format!(
                "OTP must be a {}-digit number",
                OTP_LENGTH
            )))
        }
    }

    /// Draws a fresh code from the operating system's CSPRNG.
    pub fn generate() -> Self {
        let n: u32 = rand::rngs::OsRng.gen_range(0..1_000_000);
        Self(format!("{:06}", n))
    }

    pub fn mock() -> Self {
        Self(MOCK_OTP_CODE.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares in time independent of where the codes differ.
    pub fn matches(&self, other: &OtpCode) -> bool {
        let (a, b) = (self.0.as_bytes(), other.0.as_bytes());
        a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
    }
}

// Codes are secrets; keep them out of `{:?}` output.
impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OtpCode(******)")
    }
}

impl TryFrom<String> for OtpCode {
    type Error = WalletError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<OtpCode> for String {
    fn from(code: OtpCode) -> Self {
        code.0
    }
}

/// The single active credential for an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpRecord {
    pub identity_key: IdentityKey,
    pub code: OtpCode,
    /// Distinguishes this issuance from any later one for the same identity.
    pub issuance_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
}

impl OtpRecord {
    pub fn new(identity_key: IdentityKey, code: OtpCode, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            identity_key,
            code,
            issuance_id: Uuid::new_v4(),
            created_at: now,
            expires_at: now + ttl,
            attempts: 0,
        }
    }

    /// A code is usable strictly before `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// How a verification attempt resolved against the stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Verified,
    NotFound,
    Expired,
    LockedOut,
    Mismatch { remaining_attempts: u32 },
}

impl VerifyOutcome {
    pub fn into_result(self) -> Result<()> {
        match self {
            VerifyOutcome::Verified => Ok(()),
            VerifyOutcome::NotFound => Err(WalletError::NotFound),
            VerifyOutcome::Expired => Err(WalletError::Expired),
            VerifyOutcome::LockedOut => Err(WalletError::LockedOut),
            VerifyOutcome::Mismatch { remaining_attempts } => {
                Err(WalletError::Mismatch { remaining_attempts })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = OtpCode::generate();
            assert_eq!(code.as_str().len(), OTP_LENGTH);
            assert!(OtpCode::parse(code.as_str()).is_ok());
        }
    }

    #[test]
    fn test_code_format_is_enforced() {
        assert!(OtpCode::parse("012345").is_ok());
        assert!(OtpCode::parse("12345").is_err());
        assert!(OtpCode::parse("1234567").is_err());
        assert!(OtpCode::parse("12a456").is_err());
    }

    #[test]
    fn test_code_is_redacted_in_debug() {
        let code = OtpCode::parse("654321").unwrap();
        assert!(!format!("{:?}", code).contains("654321"));
    }

    #[test]
    fn test_record_expiry_boundary() {
        let now = Utc::now();
        let record = OtpRecord::new(
            IdentityKey::parse("9876543210").unwrap(),
            OtpCode::mock(),
            now,
            Duration::seconds(OTP_TTL_SECS as i64),
        );
        assert!(!record.is_expired(now));
        assert!(!record.is_expired(record.expires_at - Duration::milliseconds(1)));
        assert!(record.is_expired(record.expires_at));
    }

    #[test]
    fn test_code_matching() {
        let code = OtpCode::parse("246810").unwrap();
        assert!(code.matches(&OtpCode::parse("246810").unwrap()));
        assert!(!code.matches(&OtpCode::parse("246811").unwrap()));
    }
}
