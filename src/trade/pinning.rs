//! Metadata pinning collaborator

use super::image::TokenImage;
use super::request::TokenLaunch;
use super::upstream_message;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

/// Uploads image + metadata and returns the metadata URI
#[async_trait]
pub trait MetadataPinner: Send + Sync {
    async fn pin(&self, launch: &TokenLaunch, image: TokenImage) -> Result<String>;
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PinResponse {
    metadata_uri: Option<String>,
}

/// Multipart upload to an IPFS pinning endpoint
pub struct HttpPinner {
    client: Client,
    url: String,
}

impl HttpPinner {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    fn form(launch: &TokenLaunch, image: TokenImage) -> Result<Form> {
        let file_name = image.file_name();
        let part = Part::bytes(image.bytes)
            .file_name(file_name)
            .mime_str(&image.mime)?;

        let mut form = Form::new()
            .text("name", launch.name.trim().to_string())
            .text("symbol", launch.symbol.trim().to_string())
            .text("description", launch.description.clone())
            .text("showName", "true")
            .part("file", part);

        for (key, value) in [
            ("twitter", &launch.twitter),
            ("telegram", &launch.telegram),
            ("website", &launch.website),
        ] {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                form = form.text(key, v.to_string());
            }
        }
        Ok(form)
    }
}

#[async_trait]
impl MetadataPinner for HttpPinner {
    async fn pin(&self, launch: &TokenLaunch, image: TokenImage) -> Result<String> {
        let form = Self::form(launch, image)?;

        tracing::info!(symbol = %launch.symbol, "Pinning token metadata");
        let response = self.client.post(&self.url).multipart(form).send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            return Err(Error::Pinning(format!(
                "HTTP {}: {}",
                status.as_u16(),
                upstream_message(&body)
            )));
        }

        let parsed: PinResponse = serde_json::from_slice(&body)
            .map_err(|_| Error::Pinning(upstream_message(&body)))?;
        let uri = parsed
            .metadata_uri
            .filter(|u| !u.is_empty())
            .ok_or_else(|| Error::Pinning("response is missing metadataUri".to_string()))?;

        tracing::info!(metadata_uri = %uri, "Metadata pinned");
        Ok(uri)
    }
}
