//! Image loading with a strategy fallback chain.
//!
//! An image element's URL is tried with each [`LoadStrategy`] in order until
//! one succeeds:
//!
//! ```text
//! Direct ──fail──▶ Anonymous ──fail──▶ Credentialed ──fail──▶ Proxy ──fail──▶ placeholder
//! ```
//!
//! Each attempt is independent. The proxy step only runs when a proxy URL
//! template is configured. The user is notified once per chain, never per
//! attempt.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::notify::Notifier;

/// How a single load attempt is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStrategy {
    /// Plain request.
    Direct,
    /// Cross-origin request without credentials.
    Anonymous,
    /// Cross-origin request with credentials.
    Credentialed,
    /// Request through a CORS proxy rewrite of the URL.
    Proxy,
}

impl LoadStrategy {
    /// The full chain, in attempt order.
    pub const CHAIN: [Self; 4] = [Self::Direct, Self::Anonymous, Self::Credentialed, Self::Proxy];
}

impl std::fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Direct => "direct",
            Self::Anonymous => "anonymous",
            Self::Credentialed => "credentialed",
            Self::Proxy => "proxy",
        };
        f.write_str(name)
    }
}

/// A fetched and decoded image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    /// Encoded bytes, shared between surface objects and the cache.
    pub bytes: Arc<Vec<u8>>,
    /// MIME type of the encoded bytes.
    pub mime: String,
    /// Intrinsic width in pixels.
    pub width: u32,
    /// Intrinsic height in pixels.
    pub height: u32,
}

/// A failed load attempt.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connection or transport failure.
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-success status.
    #[error("HTTP status {0}")]
    Status(u16),

    /// The response was not a decodable image.
    #[error("Failed to decode image: {0}")]
    Decode(String),

    /// The URL cannot be loaded with this strategy.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// The image body is larger than the fetcher accepts.
    #[error("Image larger than {limit} bytes")]
    TooLarge {
        /// Configured byte limit.
        limit: usize,
    },
}

/// Every attempt of a chain failed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("All {} load attempts failed for {url}", attempts.len())]
pub struct ChainFailure {
    /// URL that was requested.
    pub url: String,
    /// Each attempt and why it failed.
    pub attempts: Vec<(LoadStrategy, FetchError)>,
}

/// Performs a single load attempt.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch and decode `url` using `strategy`.
    ///
    /// For [`LoadStrategy::Proxy`] the URL has already been rewritten.
    ///
    /// # Errors
    ///
    /// Returns a [`FetchError`] describing why this attempt failed.
    async fn fetch(&self, url: &str, strategy: LoadStrategy) -> Result<LoadedImage, FetchError>;
}

/// Configuration for the load chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLoadConfig {
    /// Proxy URL template; `{url}` is replaced by the percent-encoded URL.
    /// `None` disables the proxy step.
    pub proxy_template: Option<String>,
    /// Strategies to try, in order.
    pub strategies: Vec<LoadStrategy>,
}

impl Default for ImageLoadConfig {
    fn default() -> Self {
        Self {
            proxy_template: None,
            strategies: LoadStrategy::CHAIN.to_vec(),
        }
    }
}

impl ImageLoadConfig {
    /// Enable the proxy step with the given template.
    #[must_use]
    pub fn with_proxy(mut self, template: impl Into<String>) -> Self {
        self.proxy_template = Some(template.into());
        self
    }

    /// The attempts to make for `url`, with the URL each attempt requests.
    #[must_use]
    pub fn plan(&self, url: &str) -> Vec<(LoadStrategy, String)> {
        if is_data_uri(url) {
            return vec![(LoadStrategy::Direct, url.to_string())];
        }
        self.strategies
            .iter()
            .filter_map(|strategy| match strategy {
                LoadStrategy::Proxy => self
                    .proxy_template
                    .as_deref()
                    .map(|t| (LoadStrategy::Proxy, proxy_url(t, url))),
                other => Some((*other, url.to_string())),
            })
            .collect()
    }
}

/// Whether `url` is an inline `data:` URI.
#[must_use]
pub fn is_data_uri(url: &str) -> bool {
    url.trim_start().starts_with("data:")
}

/// Rewrite `url` through a proxy template.
#[must_use]
pub fn proxy_url(template: &str, url: &str) -> String {
    let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
    if template.contains("{url}") {
        template.replace("{url}", &encoded)
    } else {
        format!("{template}{encoded}")
    }
}

/// Run the fallback chain for one URL.
///
/// Notifies `notifier` exactly once: success or failure.
///
/// # Errors
///
/// Returns a [`ChainFailure`] listing every attempt if none succeeded.
pub async fn load_image_chain(
    fetcher: &dyn ImageFetcher,
    url: &str,
    config: &ImageLoadConfig,
    notifier: &dyn Notifier,
) -> Result<LoadedImage, ChainFailure> {
    let mut attempts = Vec::new();

    for (strategy, request_url) in config.plan(url) {
        match fetcher.fetch(&request_url, strategy).await {
            Ok(image) => {
                tracing::debug!(
                    "Loaded {url} via {strategy} ({}x{})",
                    image.width,
                    image.height
                );
                notifier.success("Image loaded");
                return Ok(image);
            }
            Err(e) => {
                tracing::warn!("Image load attempt {strategy} failed for {url}: {e}");
                attempts.push((strategy, e));
            }
        }
    }

    notifier.error(&format!("Could not load image from {}", short_url(url)));
    Err(ChainFailure {
        url: url.to_string(),
        attempts,
    })
}

fn short_url(url: &str) -> &str {
    if is_data_uri(url) {
        "inline data"
    } else {
        url
    }
}
