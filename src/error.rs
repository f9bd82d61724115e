use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("OTP not found or expired")]
    NotFound,
    #[error("OTP has expired")]
    Expired,
    #[error("Too many failed attempts, request a new OTP")]
    LockedOut,
    #[error("Invalid OTP, {remaining_attempts} attempt(s) remaining")]
    Mismatch { remaining_attempts: u32 },
    #[error("Notification provider error: {0}")]
    ProviderError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds { balance: u64, requested: u64 },
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Account already exists: {0}")]
    AccountExists(String),
    #[error("Payment request not found: {0}")]
    PaymentNotFound(Uuid),
    #[error("Payment request {id} is already {status}")]
    InvalidTransition { id: Uuid, status: String },
    #[error("Already enrolled in tournament {0}")]
    AlreadyEnrolled(String),
    #[error("Admin credentials required")]
    Unauthorized,
    #[error("Write conflict: {0}")]
    Conflict(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Internal error: {0}")]
    InternalError(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl WalletError {
    /// Stable machine-readable identifier exposed to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            WalletError::ValidationError(_) => "validation_error",
            WalletError::NotFound => "otp_not_found",
            WalletError::Expired => "otp_expired",
            WalletError::LockedOut => "otp_locked_out",
            WalletError::Mismatch { .. } => "otp_mismatch",
            WalletError::ProviderError(_) => "provider_error",
            WalletError::ConfigError(_) => "config_error",
            WalletError::InsufficientFunds { .. } => "insufficient_funds",
            WalletError::AccountNotFound(_) => "account_not_found",
            WalletError::AccountExists(_) => "account_exists",
            WalletError::PaymentNotFound(_) => "payment_not_found",
            WalletError::InvalidTransition { .. } => "invalid_transition",
            WalletError::AlreadyEnrolled(_) => "already_enrolled",
            WalletError::Unauthorized => "unauthorized",
            WalletError::Conflict(_) => "write_conflict",
            WalletError::StorageError(_) => "storage_error",
            WalletError::InternalError(_) => "internal_error",
        }
    }

    /// Whether the operation may succeed if attempted again unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, WalletError::Conflict(_))
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        WalletError::StorageError(format!("Serialization error: {}", e))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for WalletError {
    fn from(e: rocksdb::Error) -> Self {
        match e.kind() {
            rocksdb::ErrorKind::Busy
            | rocksdb::ErrorKind::TimedOut
            | rocksdb::ErrorKind::TryAgain => WalletError::Conflict(e.into_string()),
            _ => WalletError::StorageError(e.into_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;
