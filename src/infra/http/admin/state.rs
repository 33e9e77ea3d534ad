use std::sync::Arc;

use crate::cache::ContentCache;
use crate::infra::cache_warmer::CacheWarmer;
use crate::infra::http::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AdminState {
    pub cache: Arc<ContentCache>,
    /// `None` when no upstream is configured.
    pub warmer: Option<Arc<CacheWarmer>>,
    pub rate_limiter: RateLimiter,
}
