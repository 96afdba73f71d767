//! Transaction assembler collaborator

use super::request::TradeRequest;
use super::upstream_message;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use solana_sdk::transaction::VersionedTransaction;

/// Converts a trade request into an unsigned transaction
#[async_trait]
pub trait TransactionAssembler: Send + Sync {
    async fn assemble(&self, request: &TradeRequest) -> Result<VersionedTransaction>;
}

/// `POST` JSON to the trade-local endpoint, binary transaction back
pub struct HttpAssembler {
    client: Client,
    url: String,
    api_key: Option<SecretString>,
}

impl HttpAssembler {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }
}

#[async_trait]
impl TransactionAssembler for HttpAssembler {
    async fn assemble(&self, request: &TradeRequest) -> Result<VersionedTransaction> {
        let mut http = self.client.post(&self.url).json(request);
        if let Some(key) = &self.api_key {
            http = http.query(&[("api-key", key.expose_secret())]);
        }

        tracing::info!(
            action = %request.action,
            mint = %request.mint,
            amount = request.amount,
            "Requesting transaction from assembler"
        );
        let response = http.send().await?;
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.bytes().await?;

        decode_assembler_response(status, content_type.as_deref(), &body)
    }
}

/// Leading byte of a JSON or HTML body. A body declared binary is sniffed on
/// its first raw byte: a legacy transaction's signature count can be a
/// whitespace byte (9, 10, 12 or 13 signatures).
fn looks_like_text(body: &[u8], declared_binary: bool) -> bool {
    let first = if declared_binary {
        body.first()
    } else {
        body.iter().find(|b| !b.is_ascii_whitespace())
    };
    matches!(first, Some(b'{') | Some(b'[') | Some(b'<') | Some(b'"'))
}

/// Classify an assembler response and decode it only when it is a binary
/// transaction. JSON, HTML and non-2xx bodies become `Error::Assembly` with the
/// upstream message.
pub fn decode_assembler_response(
    status: StatusCode,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<VersionedTransaction> {
    let content_type = content_type.unwrap_or_default().to_ascii_lowercase();
    let textual = content_type.contains("json")
        || content_type.starts_with("text/")
        || looks_like_text(body, content_type.contains("octet-stream"));

    if !status.is_success() {
        let message = upstream_message(body);
        tracing::warn!(status = status.as_u16(), error = %message, "Assembler rejected request");
        return Err(Error::Assembly(message));
    }
    if textual {
        return Err(Error::Assembly(upstream_message(body)));
    }
    if body.is_empty() {
        return Err(Error::Assembly("empty transaction payload".to_string()));
    }

    bincode::deserialize::<VersionedTransaction>(body)
        .map_err(|e| Error::Assembly(format!("undecodable transaction payload: {}", e)))
}
