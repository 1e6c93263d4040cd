//! Rate-limited, cached HTTP client for external market lookups.
//!
//! All outbound search/fetch traffic goes through this crate so the
//! published rate ceilings hold no matter how many workers share the
//! client. Cache hits are answered before any rate accounting.

mod cache;
mod client;
mod rate_limit;

pub use cache::TtlCache;
pub use client::{PageContent, SearchResult, WebClient, WebClientConfig};
pub use rate_limit::{RateLimiter, SlidingWindow};
