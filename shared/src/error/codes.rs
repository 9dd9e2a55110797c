//! Unified error codes for the BOSAN portal backend
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 3xxx: Member / import errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Invalid format
    InvalidFormat = 6,
    /// Required field missing
    RequiredField = 7,
    /// Value out of range
    ValueOutOfRange = 8,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Invalid credentials (username/password)
    InvalidCredentials = 1002,
    /// Token has expired
    TokenExpired = 1003,
    /// Token is invalid
    TokenInvalid = 1004,
    /// Account is disabled
    AccountDisabled = 1005,
    /// Password too short
    PasswordTooShort = 1006,

    // ==================== 3xxx: Member / Import ====================
    /// Member not found
    MemberNotFound = 3001,
    /// Account activation failed
    ActivationFailed = 3002,
    /// Activation token is invalid
    ActivationTokenInvalid = 3003,
    /// Activation token has expired
    ActivationTokenExpired = 3004,
    /// No spreadsheet file provided in request
    NoFileProvided = 3101,
    /// Unsupported spreadsheet file type
    UnsupportedFileType = 3102,
    /// Spreadsheet has no data rows
    SpreadsheetEmpty = 3103,
    /// Spreadsheet is missing required columns
    MissingColumns = 3104,
    /// No rows survived validation
    NoValidRows = 3105,
    /// Mail transport is not configured
    MailConfigMissing = 3201,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Operation timeout
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::RequiredField => "Required field is missing",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::InvalidCredentials => "Invalid username or password",
            ErrorCode::TokenExpired => "Token has expired",
            ErrorCode::TokenInvalid => "Token is invalid",
            ErrorCode::AccountDisabled => "Account is disabled",
            ErrorCode::PasswordTooShort => "Password is too short",

            // Member / Import
            ErrorCode::MemberNotFound => "Member not found",
            ErrorCode::ActivationFailed => "Account activation failed",
            ErrorCode::ActivationTokenInvalid => "Invalid or expired token",
            ErrorCode::ActivationTokenExpired => "Activation token has expired",
            ErrorCode::NoFileProvided => "No spreadsheet file was uploaded",
            ErrorCode::UnsupportedFileType => "Invalid file type - Please upload an Excel file",
            ErrorCode::SpreadsheetEmpty => "Spreadsheet file appears to be empty",
            ErrorCode::MissingColumns => "Missing required columns in spreadsheet",
            ErrorCode::NoValidRows => "No valid rows found after validation",
            ErrorCode::MailConfigMissing => "Missing email configuration",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "E{:04}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when converting an unknown u16 into an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid error code: {0}")]
pub struct InvalidErrorCode(pub u16);

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            0 => ErrorCode::Success,
            1 => ErrorCode::Unknown,
            2 => ErrorCode::ValidationFailed,
            3 => ErrorCode::NotFound,
            4 => ErrorCode::AlreadyExists,
            5 => ErrorCode::InvalidRequest,
            6 => ErrorCode::InvalidFormat,
            7 => ErrorCode::RequiredField,
            8 => ErrorCode::ValueOutOfRange,
            1001 => ErrorCode::NotAuthenticated,
            1002 => ErrorCode::InvalidCredentials,
            1003 => ErrorCode::TokenExpired,
            1004 => ErrorCode::TokenInvalid,
            1005 => ErrorCode::AccountDisabled,
            1006 => ErrorCode::PasswordTooShort,
            3001 => ErrorCode::MemberNotFound,
            3002 => ErrorCode::ActivationFailed,
            3003 => ErrorCode::ActivationTokenInvalid,
            3004 => ErrorCode::ActivationTokenExpired,
            3101 => ErrorCode::NoFileProvided,
            3102 => ErrorCode::UnsupportedFileType,
            3103 => ErrorCode::SpreadsheetEmpty,
            3104 => ErrorCode::MissingColumns,
            3105 => ErrorCode::NoValidRows,
            3201 => ErrorCode::MailConfigMissing,
            9001 => ErrorCode::InternalError,
            9002 => ErrorCode::DatabaseError,
            9003 => ErrorCode::NetworkError,
            9004 => ErrorCode::TimeoutError,
            9005 => ErrorCode::ConfigError,
            other => return Err(InvalidErrorCode(other)),
        };
        Ok(code)
    }
}
