//! Error types for the wallet

use serde::Serialize;
use thiserror::Error;

/// Maximum length of upstream detail text shown to the user
pub const MAX_DETAIL_CHARS: usize = 300;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Transaction assembly failed: {0}")]
    Assembly(String),

    #[error("Metadata pinning failed: {0}")]
    Pinning(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Chain RPC error: {0}")]
    ChainRpc(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Interceptor blocked: {0}")]
    Blocked(String),

    #[error("Wallet busy: {0}")]
    Busy(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Error::Validation {
            field,
            message: message.into(),
        }
    }

    /// Short user-facing category for the error
    pub fn category(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "Invalid input",
            Error::Auth(_) => "Incorrect password",
            Error::Session(_) => "Wallet is locked",
            Error::Storage(_) => "Wallet storage failure",
            Error::Assembly(msg) | Error::Pinning(msg) => known_upstream_category(msg)
                .unwrap_or(if matches!(self, Error::Assembly(_)) {
                    "Trade service rejected the request"
                } else {
                    "Token metadata upload failed"
                }),
            Error::Network(_) => "Network request failed",
            Error::ChainRpc(_) => "Solana RPC request failed",
            Error::Wallet(_) => "Wallet error",
            Error::Config(_) => "Configuration error",
            Error::Blocked(_) => "Trade blocked by risk policy",
            Error::Busy(_) => "Another transaction is still in flight",
            Error::Json(_) => "Malformed response",
        }
    }
}

/// Categories for well-known phrases in upstream service error bodies.
///
/// The assembler and pinning services only return free text, so this is the one
/// place that still looks at message contents. Chain errors go through the
/// structured table in `chain::classify`.
fn known_upstream_category(message: &str) -> Option<&'static str> {
    let lower = message.to_lowercase();
    if lower.contains("insufficient lamports") || lower.contains("insufficient funds") {
        Some("Insufficient SOL balance")
    } else if lower.contains("invalid metadatauri") {
        Some("Token metadata URI was rejected")
    } else if lower.contains("compute budget") || lower.contains("computational budget") {
        Some("Insufficient compute budget")
    } else {
        None
    }
}

/// The single user-facing failure shape produced at the pipeline boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub error: String,
    pub details: Option<String>,
}

impl ErrorReport {
    pub fn new(error: impl Into<String>, details: Option<String>) -> Self {
        Self {
            error: error.into(),
            details: details.map(|d| truncate_detail(&d, MAX_DETAIL_CHARS)),
        }
    }
}

impl From<&Error> for ErrorReport {
    fn from(err: &Error) -> Self {
        ErrorReport::new(err.category(), Some(err.to_string()))
    }
}

impl From<Error> for ErrorReport {
    fn from(err: Error) -> Self {
        ErrorReport::from(&err)
    }
}

/// Truncate upstream text to `max_chars` characters, marking the cut
pub fn truncate_detail(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}... [truncated]", &text[..idx]),
        None => text.to_string(),
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_respects_char_boundaries() {
        let text = "é".repeat(10);
        assert_eq!(truncate_detail(&text, 3), "ééé... [truncated]");
        assert_eq!(truncate_detail("short", 300), "short");
    }

    #[test]
    fn report_truncates_details() {
        let long = "x".repeat(1000);
        let report = ErrorReport::from(Error::Assembly(long));
        let details = report.details.unwrap();
        assert!(details.ends_with("[truncated]"));
        assert!(details.chars().count() < 400);
    }

    #[test]
    fn upstream_phrases_are_remapped() {
        let err = Error::Assembly("Transfer: insufficient lamports 100, need 200".into());
        assert_eq!(err.category(), "Insufficient SOL balance");

        let err = Error::Pinning("Invalid metadataUri".into());
        assert_eq!(err.category(), "Token metadata URI was rejected");

        let err = Error::Assembly("bad request".into());
        assert_eq!(err.category(), "Trade service rejected the request");
    }

    #[test]
    fn validation_message_names_field() {
        let err = Error::validation("amount", "must be greater than zero");
        assert_eq!(err.to_string(), "Invalid amount: must be greater than zero");
    }
}
