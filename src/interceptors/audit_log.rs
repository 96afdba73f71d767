//! Audit log interceptor
//!
//! Appends one JSON line per pipeline start and completion.

use super::{Completion, InterceptorDecision, Operation, TradeContext, TradeInterceptor};
use crate::chain::BroadcastOutcome;
use crate::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Entry in the audit log
#[derive(Debug, Serialize)]
struct AuditEntry<'a> {
    timestamp: DateTime<Utc>,
    entry_type: &'static str,
    operation: Operation,
    owner: String,
    target: Option<&'a str>,
    amount: f64,
    outcome: Option<&'static str>,
    signature: Option<String>,
    error: Option<String>,
    duration_ms: u64,
}

impl<'a> AuditEntry<'a> {
    fn start(context: &'a TradeContext) -> Self {
        Self {
            timestamp: Utc::now(),
            entry_type: "start",
            operation: context.operation,
            owner: context.owner.to_string(),
            target: context.target.as_deref(),
            amount: context.amount,
            outcome: None,
            signature: None,
            error: None,
            duration_ms: 0,
        }
    }
}

/// Writer for audit log entries
struct AuditLogWriter {
    path: PathBuf,
}

impl AuditLogWriter {
    fn write(&self, entry: &AuditEntry<'_>) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

/// Interceptor that logs every operation to a JSONL file
pub struct AuditLogInterceptor {
    writer: Arc<Mutex<AuditLogWriter>>,
}

impl AuditLogInterceptor {
    /// # Arguments
    /// * `log_path` - Path to the audit log file (JSONL format)
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(AuditLogWriter {
                path: log_path.into(),
            })),
        }
    }

    async fn append(&self, entry: &AuditEntry<'_>) {
        let writer = self.writer.lock().await;
        if let Err(e) = writer.write(entry) {
            tracing::warn!(error = %e, "Failed to write audit log entry");
        }
    }
}

#[async_trait]
impl TradeInterceptor for AuditLogInterceptor {
    async fn intercept(&self, context: &TradeContext) -> Result<InterceptorDecision> {
        self.append(&AuditEntry::start(context)).await;

        // Audit logging never blocks
        Ok(InterceptorDecision::Allow)
    }

    async fn on_complete(&self, context: &TradeContext, result: Completion<'_>, duration_ms: u64) {
        let (outcome, signature, error) = match result {
            Ok(outcome) => (
                Some(outcome.status()),
                outcome.signature().map(ToString::to_string),
                match outcome {
                    BroadcastOutcome::Failed(reason) => Some(reason.to_string()),
                    _ => None,
                },
            ),
            Err(e) => (Some("error"), None, Some(e.to_string())),
        };

        let entry = AuditEntry {
            entry_type: "complete",
            outcome,
            signature,
            error,
            duration_ms,
            ..AuditEntry::start(context)
        };
        self.append(&entry).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interceptors::test_context;
    use crate::Error;
    use serde_json::Value;
    use solana_sdk::signature::Signature;
    use tempfile::NamedTempFile;

    fn entries(file: &NamedTempFile) -> Vec<Value> {
        std::fs::read_to_string(file.path())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_logs_start_and_complete() {
        let temp_file = NamedTempFile::new().unwrap();
        let interceptor = AuditLogInterceptor::new(temp_file.path());
        let context = test_context(Operation::Buy, Some(0.25));

        let decision = interceptor.intercept(&context).await.unwrap();
        assert!(matches!(decision, InterceptorDecision::Allow));

        let outcome = BroadcastOutcome::Confirmed(Signature::default());
        interceptor.on_complete(&context, Ok(&outcome), 150).await;

        let entries = entries(&temp_file);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["entry_type"], "start");
        assert_eq!(entries[0]["operation"], "buy");
        assert_eq!(entries[1]["entry_type"], "complete");
        assert_eq!(entries[1]["outcome"], "confirmed");
        assert_eq!(entries[1]["duration_ms"], 150);
        assert_eq!(entries[1]["amount"], 0.25);
    }

    #[tokio::test]
    async fn test_logs_errors() {
        let temp_file = NamedTempFile::new().unwrap();
        let interceptor = AuditLogInterceptor::new(temp_file.path());
        let context = test_context(Operation::Sell, None);

        let err = Error::Assembly("pool not found".into());
        interceptor.on_complete(&context, Err(&err), 5).await;

        let entries = entries(&temp_file);
        assert_eq!(entries[0]["outcome"], "error");
        assert!(entries[0]["error"].as_str().unwrap().contains("pool not found"));
        assert!(entries[0]["signature"].is_null());
    }

    #[tokio::test]
    async fn test_unwritable_path_does_not_block() {
        let dir = tempfile::tempdir().unwrap();
        let interceptor = AuditLogInterceptor::new(dir.path().join("missing").join("audit.jsonl"));

        let decision = interceptor
            .intercept(&test_context(Operation::Buy, Some(0.1)))
            .await
            .unwrap();
        assert!(matches!(decision, InterceptorDecision::Allow));
    }
}
