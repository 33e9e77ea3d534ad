//! Upstream CMS adapter.
//!
//! Only the collection endpoints the cache warmer needs are modelled; request
//! handlers fetch through their own clients and cache via
//! [`ContentCache::get_or_fetch`](crate::cache::ContentCache::get_or_fetch).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::cache::{CacheKey, ResourceKind};
use crate::config::UpstreamSettings;

use super::error::InfraError;

/// Hot collection warmed ahead of traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WarmTarget {
    Categories,
    Tags,
    Authors,
    Posts,
}

impl WarmTarget {
    /// Warm order: a target comes after everything it depends on.
    pub const ORDER: [WarmTarget; 4] = [
        WarmTarget::Categories,
        WarmTarget::Tags,
        WarmTarget::Authors,
        WarmTarget::Posts,
    ];

    pub fn kind(self) -> ResourceKind {
        match self {
            WarmTarget::Categories => ResourceKind::Categories,
            WarmTarget::Tags => ResourceKind::Tags,
            WarmTarget::Authors => ResourceKind::Authors,
            WarmTarget::Posts => ResourceKind::PostList,
        }
    }

    /// `categories:all`, `tags:all`, `authors:all`, `posts:all`.
    pub fn key(self) -> CacheKey {
        CacheKey::new(self.kind(), "all")
    }

    /// Collection path relative to the upstream base URL.
    pub fn path(self) -> &'static str {
        match self {
            WarmTarget::Categories => "categories",
            WarmTarget::Tags => "tags",
            WarmTarget::Authors => "authors",
            WarmTarget::Posts => "posts",
        }
    }

    /// The unfiltered post list embeds category and tag names.
    pub fn dependencies(self) -> &'static [WarmTarget] {
        match self {
            WarmTarget::Posts => &[WarmTarget::Categories, WarmTarget::Tags],
            _ => &[],
        }
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("invalid upstream url for `{path}`: {source}")]
    Url {
        path: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("request to `{url}` failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("upstream returned status {status} for `{url}`")]
    Status { url: String, status: u16 },
    #[error("failed to decode response from `{url}`: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Source of warmable CMS documents.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, target: WarmTarget) -> Result<Value, SourceError>;
}

/// JSON-over-HTTP CMS client.
#[derive(Clone, Debug)]
pub struct HttpContentSource {
    client: Client,
    base: Url,
}

impl HttpContentSource {
    pub fn new(base: Url, timeout: Duration) -> Result<Self, InfraError> {
        let client = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(timeout)
            .build()
            .map_err(|err| InfraError::upstream(format!("failed to build http client: {err}")))?;
        Ok(Self {
            client,
            base: with_trailing_slash(base),
        })
    }

    /// `None` when no upstream is configured.
    pub fn from_settings(settings: &UpstreamSettings) -> Result<Option<Self>, InfraError> {
        settings
            .base_url
            .clone()
            .map(|base| Self::new(base, settings.timeout))
            .transpose()
    }

    pub fn user_agent() -> &'static str {
        concat!("newsroom/", env!("CARGO_PKG_VERSION"))
    }

    pub fn url_for(&self, target: WarmTarget) -> Result<Url, SourceError> {
        self.base
            .join(target.path())
            .map_err(|source| SourceError::Url {
                path: target.path(),
                source,
            })
    }
}

#[async_trait]
impl ContentSource for HttpContentSource {
    async fn fetch(&self, target: WarmTarget) -> Result<Value, SourceError> {
        let url = self.url_for(target)?;
        debug!(target = "newsroom::upstream", url = %url, "fetching upstream collection");

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| SourceError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|source| SourceError::Decode {
                url: url.to_string(),
                source,
            })
    }
}

fn with_trailing_slash(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(base: &str) -> HttpContentSource {
        HttpContentSource::new(
            Url::parse(base).expect("valid url"),
            Duration::from_secs(1),
        )
        .expect("client")
    }

    #[test]
    fn warm_keys_follow_convention() {
        let keys: Vec<String> = WarmTarget::ORDER
            .iter()
            .map(|target| target.key().to_string())
            .collect();
        assert_eq!(
            keys,
            vec!["categories:all", "tags:all", "authors:all", "posts:all"]
        );
    }

    #[test]
    fn dependencies_precede_dependents_in_order() {
        for (index, target) in WarmTarget::ORDER.iter().enumerate() {
            for dep in target.dependencies() {
                let position = WarmTarget::ORDER
                    .iter()
                    .position(|candidate| candidate == dep)
                    .expect("dependency is warmed");
                assert!(position < index, "{dep:?} must be warmed before {target:?}");
            }
        }
    }

    #[test]
    fn collection_urls_extend_base_path() {
        let with_slash = source("https://cms.example/wp-json/wp/v2/");
        let without_slash = source("https://cms.example/wp-json/wp/v2");

        for source in [with_slash, without_slash] {
            assert_eq!(
                source.url_for(WarmTarget::Posts).expect("url").as_str(),
                "https://cms.example/wp-json/wp/v2/posts"
            );
        }
    }

    #[test]
    fn no_base_url_means_no_source() {
        let settings = UpstreamSettings {
            base_url: None,
            timeout: Duration::from_secs(1),
        };
        assert!(
            HttpContentSource::from_settings(&settings)
                .expect("no error")
                .is_none()
        );
    }
}
