#![forbid(unsafe_code)]

mod cache;
mod config;
mod entry;

pub use cache::TtlCache;
pub use config::{CacheConfig, ExpirationMode};
