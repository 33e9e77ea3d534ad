//! Cache key definitions.
//!
//! Keys follow the `kind:discriminator` convention (`post:123`,
//! `posts:cat=5:page=2`). Two distinct cached artifacts must never share a key.

use std::borrow::Borrow;
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of CMS resource a cache entry holds. Used as the key prefix and to
/// pick a TTL from [`TtlPolicy`](super::TtlPolicy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Paginated or filtered post listings.
    PostList,
    Post,
    Page,
    Category,
    /// The full category collection.
    Categories,
    Tag,
    Tags,
    Author,
    Authors,
    Media,
    Search,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 11] = [
        ResourceKind::PostList,
        ResourceKind::Post,
        ResourceKind::Page,
        ResourceKind::Category,
        ResourceKind::Categories,
        ResourceKind::Tag,
        ResourceKind::Tags,
        ResourceKind::Author,
        ResourceKind::Authors,
        ResourceKind::Media,
        ResourceKind::Search,
    ];

    /// Key prefix for this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::PostList => "posts",
            ResourceKind::Post => "post",
            ResourceKind::Page => "page",
            ResourceKind::Category => "category",
            ResourceKind::Categories => "categories",
            ResourceKind::Tag => "tag",
            ResourceKind::Tags => "tags",
            ResourceKind::Author => "author",
            ResourceKind::Authors => "authors",
            ResourceKind::Media => "media",
            ResourceKind::Search => "search",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        ResourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or(())
    }
}

/// Opaque cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    /// `kind:discriminator`, e.g. `CacheKey::new(ResourceKind::Post, 123)` is `post:123`.
    pub fn new(kind: ResourceKind, discriminator: impl fmt::Display) -> Self {
        Self(format!("{kind}:{discriminator}"))
    }

    /// `kind:name=value:name=value`, parameters kept in the order given.
    ///
    /// Callers must pass parameters in a stable order, otherwise the same
    /// logical query maps to two keys.
    pub fn with_params<V: fmt::Display>(kind: ResourceKind, params: &[(&str, V)]) -> Self {
        let mut key = kind.as_str().to_string();
        for (name, value) in params {
            key.push(':');
            key.push_str(name);
            key.push('=');
            key.push_str(&value.to_string());
        }
        Self(key)
    }

    /// Key for a search result page. The normalized query is hashed so
    /// arbitrary user input never leaks separators into the key.
    pub fn search(query: &str, page: u32) -> Self {
        let normalized = query.split_whitespace().collect::<Vec<_>>().join(" ");
        let digest = hash_value(&normalized.to_lowercase());
        Self(format!("{}:{digest:016x}:page={page}", ResourceKind::Search))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resource kind parsed from the key prefix, if it is a known one.
    pub fn kind(&self) -> Option<ResourceKind> {
        let prefix = self.0.split(':').next()?;
        prefix.parse().ok()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CacheKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&CacheKey> for CacheKey {
    fn from(value: &CacheKey) -> Self {
        value.clone()
    }
}

/// Key selector for bulk invalidation and scoped clears.
///
/// Matches by prefix. A trailing `*` is accepted and ignored, so `posts:*`
/// and `posts:` select the same keys; `*` alone selects everything. Note that
/// `post` also selects `posts:...` keys; include the `:` to avoid that.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPattern {
    prefix: String,
}

impl KeyPattern {
    pub fn new(pattern: &str) -> Self {
        let prefix = pattern.trim().trim_end_matches('*');
        Self {
            prefix: prefix.to_string(),
        }
    }

    pub fn matches(&self, key: &CacheKey) -> bool {
        key.as_str().starts_with(&self.prefix)
    }

    pub fn is_match_all(&self) -> bool {
        self.prefix.is_empty()
    }

    pub fn as_prefix(&self) -> &str {
        &self.prefix
    }
}

impl fmt::Display for KeyPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}*", self.prefix)
    }
}

/// Compute a hash for any hashable value.
pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
