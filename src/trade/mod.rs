//! Transaction builder and signer
//!
//! Turns a trade or launch intent into a [`SignedTransaction`]:
//! validate, pin metadata (launches only), assemble, attach a fresh blockhash,
//! sign locally.

mod assembler;
mod builder;
mod image;
mod pinning;
mod request;

pub use assembler::{decode_assembler_response, HttpAssembler, TransactionAssembler};
pub use builder::{SignedTransaction, TransactionBuilder};
pub use image::{decode_data_uri, ImageResolver, TokenImage};
pub use pinning::{HttpPinner, MetadataPinner};
pub use request::{Action, Pool, TokenLaunch, TokenMetadata, TradeRequest};

use crate::error::{truncate_detail, MAX_DETAIL_CHARS};
use serde_json::Value;

/// Best human-readable message from an upstream error body.
///
/// JSON bodies yield their `error` / `message` field; anything else is
/// returned as truncated text.
pub(crate) fn upstream_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        let field = ["error", "message", "details"]
            .iter()
            .find_map(|key| match value.get(key) {
                Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(Value::Object(inner)) => inner
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            });
        if let Some(message) = field {
            return message;
        }
    }

    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return "empty response body".to_string();
    }
    if text.starts_with('<') {
        return format!(
            "service returned an HTML page: {}",
            truncate_detail(text, MAX_DETAIL_CHARS)
        );
    }
    truncate_detail(text, MAX_DETAIL_CHARS)
}
