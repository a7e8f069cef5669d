mod error_handler;
mod metrics;
mod rate_limit;

pub use error_handler::log_errors;
pub use metrics::{HttpMetrics, track_metrics};
pub use rate_limit::{RateLimitContext, rate_limit};
