mod admin;
mod error;
mod middleware;
mod rate_limit;

pub use admin::{AdminState, build_admin_router};
pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, ErrorReport, codes};
pub use middleware::RequestContext;
pub use rate_limit::{RateLimitDecision, RateLimiter};
