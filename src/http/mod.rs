//! HTTP plumbing shared by the harvesters
//!
//! This module handles:
//! - Disk-backed response caching with a TTL
//! - Per-source request pacing
//! - Exponential backoff for transient failures
//! - Binary downloads written atomically

mod cache;
mod client;
mod limiter;
mod retry;

pub use cache::{temp_path_for, write_atomic, CachedResponse, ResponseCache};
pub use client::{build_http_client, CachedHttpClient};
pub use limiter::{Pacer, RateLimiter, SourceState};
pub use retry::BackoffPolicy;
