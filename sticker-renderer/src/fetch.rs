//! HTTP image fetcher for the materializer's retry chain.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE, ORIGIN};
use sticker_core::loader::is_data_uri;
use sticker_core::{FetchError, ImageFetcher, LoadStrategy, LoadedImage};

use crate::image::{decode_image, parse_data_uri};

/// HTTP fetcher configuration.
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Per-request timeout.
    pub timeout: Duration,
    /// `Origin` sent by the anonymous and credentialed strategies.
    pub origin: String,
    /// `Authorization` value sent by the credentialed strategy.
    pub authorization: Option<String>,
    /// User agent for every request.
    pub user_agent: String,
    /// Largest image body accepted, in bytes.
    pub max_bytes: usize,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            origin: "http://localhost".to_string(),
            authorization: None,
            user_agent: format!("sticker-studio/{}", env!("CARGO_PKG_VERSION")),
            max_bytes: 20 * 1024 * 1024,
        }
    }
}

/// Fetches images over HTTP(S) and decodes inline data URIs.
///
/// Direct and credentialed requests share a client with a cookie store;
/// anonymous and proxied requests use a separate client that never sends
/// cookies.
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    config: HttpFetcherConfig,
    with_cookies: reqwest::Client,
    anonymous: reqwest::Client,
}

impl HttpImageFetcher {
    /// Create a fetcher.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP clients cannot be built (e.g. TLS init fails).
    pub fn new(config: HttpFetcherConfig) -> Result<Self, reqwest::Error> {
        let with_cookies = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .cookie_store(true)
            .build()?;
        let anonymous = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            config,
            with_cookies,
            anonymous,
        })
    }

    fn request(&self, url: &str, strategy: LoadStrategy) -> Result<reqwest::RequestBuilder, FetchError> {
        let origin = HeaderValue::from_str(&self.config.origin)
            .map_err(|e| FetchError::Unsupported(format!("invalid origin: {e}")))?;

        let builder = match strategy {
            LoadStrategy::Direct => self.with_cookies.get(url),
            LoadStrategy::Anonymous => self.anonymous.get(url).header(ORIGIN, origin),
            LoadStrategy::Credentialed => {
                let builder = self.with_cookies.get(url).header(ORIGIN, origin);
                match &self.config.authorization {
                    Some(auth) => builder.header(AUTHORIZATION, auth.as_str()),
                    None => builder,
                }
            }
            LoadStrategy::Proxy => self.anonymous.get(url),
        };
        Ok(builder)
    }

    /// Read the body, stopping as soon as it exceeds `max_bytes`.
    async fn read_body(&self, response: &mut reqwest::Response) -> Result<Vec<u8>, FetchError> {
        let limit = self.config.max_bytes;
        let too_large = FetchError::TooLarge { limit };
        if response
            .content_length()
            .is_some_and(|len| usize::try_from(len).map_or(true, |len| len > limit))
        {
            return Err(too_large);
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?
        {
            if body.len() + chunk.len() > limit {
                return Err(too_large);
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str, strategy: LoadStrategy) -> Result<LoadedImage, FetchError> {
        if is_data_uri(url) {
            let data = parse_data_uri(url).map_err(|e| FetchError::Decode(e.to_string()))?;
            if data.bytes.len() > self.config.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.config.max_bytes,
                });
            }
            return decode_image(data.bytes, Some(&data.mime))
                .map_err(|e| FetchError::Decode(e.to_string()));
        }

        let parsed = url::Url::parse(url).map_err(|e| FetchError::Unsupported(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::Unsupported(format!(
                "scheme {} is not fetchable",
                parsed.scheme()
            )));
        }

        let mut response = self
            .request(url, strategy)?
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = self.read_body(&mut response).await?;

        tracing::trace!("Fetched {} bytes from {url} via {strategy}", bytes.len());
        decode_image(bytes, content_type.as_deref())
            .map_err(|e| FetchError::Decode(e.to_string()))
    }
}
