//! Error module for the comment relay
//!
//! This module defines the error codes and the error type shared by the
//! domain service, the event broker and the HTTP transport.

use thiserror::Error;
use std::fmt;

/// Error code for every failure the relay can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Client errors (0x0001-0x0100)
    MissingTopicKey = 0x0001,
    MalformedRequest = 0x0002,
    InvalidCommentId = 0x0003,

    // Domain errors (0x0101-0x0200)
    InvalidPayload = 0x0101,
    ParentNotFound = 0x0102,
    ParentNotTopLevel = 0x0103,

    // Sink errors (0x0201-0x0300)
    StoreFailed = 0x0201,
    LogPublishFailed = 0x0202,

    // System errors (0x0301-0x0400)
    InternalServerError = 0x0301,
    ConfigInvalid = 0x0302,
}

impl ErrorCode {
    /// Get the error code as a u16
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Get the error code category
    pub fn category(&self) -> ErrorCategory {
        match self.as_u16() {
            0x0001..=0x0100 => ErrorCategory::Client,
            0x0101..=0x0200 => ErrorCategory::Domain,
            0x0201..=0x0300 => ErrorCategory::Sink,
            0x0301..=0x0400 => ErrorCategory::System,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Try to convert a u16 to an ErrorCode
    pub fn from_u16(code: u16) -> Option<Self> {
        match code {
            0x0001 => Some(Self::MissingTopicKey),
            0x0002 => Some(Self::MalformedRequest),
            0x0003 => Some(Self::InvalidCommentId),
            0x0101 => Some(Self::InvalidPayload),
            0x0102 => Some(Self::ParentNotFound),
            0x0103 => Some(Self::ParentNotTopLevel),
            0x0201 => Some(Self::StoreFailed),
            0x0202 => Some(Self::LogPublishFailed),
            0x0301 => Some(Self::InternalServerError),
            0x0302 => Some(Self::ConfigInvalid),
            _ => None,
        }
    }

    /// Get a human-readable description of the error code
    pub fn description(&self) -> &'static str {
        match self {
            Self::MissingTopicKey => "videoId query parameter is required",
            Self::MalformedRequest => "invalid payload",
            Self::InvalidCommentId => "invalid comment id",
            Self::InvalidPayload => "authorId, videoId, and content are required",
            Self::ParentNotFound => "parent comment not found",
            Self::ParentNotTopLevel => "replies can only target top-level comments",
            Self::StoreFailed => "Comment store operation failed",
            Self::LogPublishFailed => "Failed to publish to the durable log",
            Self::InternalServerError => "Unexpected server error",
            Self::ConfigInvalid => "Invalid configuration",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MissingTopicKey => "MISSING_TOPIC_KEY",
            Self::MalformedRequest => "MALFORMED_REQUEST",
            Self::InvalidCommentId => "INVALID_COMMENT_ID",
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::ParentNotFound => "PARENT_NOT_FOUND",
            Self::ParentNotTopLevel => "PARENT_NOT_TOP_LEVEL",
            Self::StoreFailed => "STORE_FAILED",
            Self::LogPublishFailed => "LOG_PUBLISH_FAILED",
            Self::InternalServerError => "INTERNAL_SERVER_ERROR",
            Self::ConfigInvalid => "CONFIG_INVALID",
        };
        write!(f, "{} (0x{:04X})", name, self.as_u16())
    }
}

/// Error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Client,
    Domain,
    Sink,
    System,
    Unknown,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client => write!(f, "Client"),
            Self::Domain => write!(f, "Domain"),
            Self::Sink => write!(f, "Sink"),
            Self::System => write!(f, "System"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Main error type for the comment relay
#[derive(Error, Debug)]
pub enum CommentRelayError {
    #[error("{code}: {message}")]
    Standard {
        code: ErrorCode,
        message: String,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Unknown error: {0}")]
    Other(String),
}

impl CommentRelayError {
    /// Create a new standard error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Standard {
            code,
            message: message.into(),
        }
    }

    /// Create a standard error carrying the code's own description
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.description())
    }

    /// Get the error code if this is a standard error
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            Self::Standard { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::Standard { message, .. } => message.clone(),
            _ => self.to_string(),
        }
    }
}

/// Result type alias for comment relay operations
pub type Result<T> = std::result::Result<T, CommentRelayError>;

impl From<String> for CommentRelayError {
    fn from(message: String) -> Self {
        Self::Other(message)
    }
}

impl From<&str> for CommentRelayError {
    fn from(message: &str) -> Self {
        Self::Other(message.to_string())
    }
}
