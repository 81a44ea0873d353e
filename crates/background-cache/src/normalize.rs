//! Turning provider image input into bytes

use crate::error::{CacheError, Result};
use crate::types::{ImageBlob, ImageInput};
use async_trait::async_trait;
use base64::alphabet;
use base64::engine::general_purpose::GeneralPurposeConfig;
use base64::engine::{DecodePaddingMode, GeneralPurpose};
use base64::Engine;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
const DATA_URL_DEFAULT_MIME_TYPE: &str = "text/plain";

/// Standard alphabet, padding optional
const DATA_URL_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<ImageBlob>;
}

/// HTTP client for downloading remote images
pub struct HttpImageFetcher {
    client: Client,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("background-cache/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &Url) -> Result<ImageBlob> {
        debug!(url = %url, "Fetching image");

        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            warn!(status = %response.status(), url = %url, "Failed to fetch image");
            return Err(CacheError::Fetch(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        let mime_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_MIME_TYPE)
            .to_string();

        let bytes = response.bytes().await?.to_vec();

        debug!(size = bytes.len(), mime_type = %mime_type, "Fetched image");
        Ok(ImageBlob::new(bytes, mime_type))
    }
}

/// Normalizes heterogeneous image input to a single binary representation
pub struct BlobNormalizer {
    fetcher: Arc<dyn ImageFetcher>,
}

impl BlobNormalizer {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self { fetcher }
    }

    /// Binary input passes through. Text is fetched as a URL first, then
    /// decoded as a `data:` URL if fetching was not possible.
    pub async fn normalize(&self, input: ImageInput) -> Result<ImageBlob> {
        let text = match input {
            ImageInput::Blob(blob) => return Ok(blob),
            ImageInput::Text(text) => text,
        };
        let text = text.trim();

        let fetch_error = match Url::parse(text) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {
                match self.fetcher.fetch(&url).await {
                    Ok(blob) => return Ok(blob),
                    Err(e) => e.to_string(),
                }
            }
            Ok(url) => format!("scheme '{}' is not fetchable", url.scheme()),
            Err(e) => format!("not a URL: {}", e),
        };

        if has_data_scheme(text) {
            return decode_data_url(text);
        }

        Err(CacheError::Conversion(fetch_error))
    }
}

fn has_data_scheme(text: &str) -> bool {
    text.get(..5)
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case("data:"))
}

/// Decode `data:[<mime>][;param...][;base64],<payload>` into bytes
pub fn decode_data_url(text: &str) -> Result<ImageBlob> {
    if !has_data_scheme(text) {
        return Err(CacheError::Conversion("missing data: scheme".to_string()));
    }

    let (header, payload) = text[5..]
        .split_once(',')
        .ok_or_else(|| CacheError::Conversion("data URL has no payload separator".to_string()))?;

    let mut params = header.split(';').map(str::trim);
    let mime_type = match params.next() {
        Some(mime) if mime.contains('/') => mime.to_ascii_lowercase(),
        _ => DATA_URL_DEFAULT_MIME_TYPE.to_string(),
    };
    let is_base64 = params.any(|p| p.eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        let compact: Vec<u8> = payload
            .bytes()
            .filter(|b| !b.is_ascii_whitespace())
            .collect();
        DATA_URL_ENGINE
            .decode(&compact)
            .map_err(|e| CacheError::Conversion(format!("invalid base64 payload: {}", e)))?
    } else {
        urlencoding::decode_binary(payload.as_bytes()).into_owned()
    };

    Ok(ImageBlob::new(bytes, mime_type))
}
