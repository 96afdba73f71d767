//! Token image resolution: data URIs and remote URLs

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;
use url::Url;

const DEFAULT_MIME: &str = "image/png";

/// Raw image bytes ready for upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenImage {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl TokenImage {
    /// File name for the multipart upload, derived from the mime type
    pub fn file_name(&self) -> String {
        let ext = match self.mime.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            _ => "png",
        };
        format!("image.{}", ext)
    }
}

/// Turns the `image` field of a launch into bytes
pub struct ImageResolver {
    client: Client,
    timeout: Duration,
}

impl ImageResolver {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            timeout,
        }
    }

    pub async fn resolve(&self, source: &str) -> Result<TokenImage> {
        let source = source.trim();
        if source.starts_with("data:") {
            return decode_data_uri(source);
        }

        let url = Url::parse(source)
            .map_err(|_| Error::validation("image", "must be a data URI or an http(s) URL"))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(Error::validation(
                "image",
                format!("unsupported URL scheme '{}'", url.scheme()),
            ));
        }

        tracing::debug!(url = %url, "Fetching token image");
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?;

        let mime = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| v.starts_with("image/"))
            .unwrap_or_else(|| DEFAULT_MIME.to_string());
        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(Error::validation("image", "remote image is empty"));
        }

        Ok(TokenImage { bytes, mime })
    }
}

/// Decode `data:<mime>;base64,<payload>`
pub fn decode_data_uri(uri: &str) -> Result<TokenImage> {
    let rest = uri
        .strip_prefix("data:")
        .ok_or_else(|| Error::validation("image", "not a data URI"))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::validation("image", "data URI has no payload"))?;

    let mut parts = header.split(';');
    let mime = parts
        .next()
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_MIME)
        .to_string();
    if !parts.any(|p| p.eq_ignore_ascii_case("base64")) {
        return Err(Error::validation("image", "data URI must be base64 encoded"));
    }

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|e| Error::validation("image", format!("invalid base64: {}", e)))?;
    if bytes.is_empty() {
        return Err(Error::validation("image", "data URI is empty"));
    }

    Ok(TokenImage { bytes, mime })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_png_data_uri() {
        let uri = format!("data:image/png;base64,{}", STANDARD.encode([0x89, b'P', b'N', b'G']));
        let image = decode_data_uri(&uri).unwrap();
        assert_eq!(image.mime, "image/png");
        assert_eq!(image.bytes, vec![0x89, b'P', b'N', b'G']);
        assert_eq!(image.file_name(), "image.png");
    }

    #[test]
    fn test_decode_defaults_mime() {
        let uri = format!("data:;base64,{}", STANDARD.encode(b"abc"));
        assert_eq!(decode_data_uri(&uri).unwrap().mime, DEFAULT_MIME);
    }

    #[test]
    fn test_decode_rejects_non_base64() {
        assert!(decode_data_uri("data:image/png,rawtext").is_err());
        assert!(decode_data_uri("data:image/png;base64,!!!").is_err());
        assert!(decode_data_uri("data:image/png;base64").is_err());
        assert!(decode_data_uri("data:image/png;base64,").is_err());
    }

    #[tokio::test]
    async fn test_resolve_rejects_unsupported_sources() {
        let resolver = ImageResolver::new(Duration::from_secs(1));

        let err = resolver.resolve("ftp://example.com/cat.png").await.unwrap_err();
        assert!(matches!(err, Error::Validation { field: "image", .. }));

        let err = resolver.resolve("cat.png").await.unwrap_err();
        assert!(matches!(err, Error::Validation { field: "image", .. }));
    }

    #[tokio::test]
    async fn test_resolve_data_uri_without_network() {
        let resolver = ImageResolver::new(Duration::from_secs(1));
        let uri = format!("data:image/jpeg;base64,{}", STANDARD.encode(b"jpeg"));
        let image = resolver.resolve(&uri).await.unwrap();
        assert_eq!(image.file_name(), "image.jpg");
    }
}
