//! Offline cache router for the business card generator.
//!
//! Requests from the application go through a [`CacheRouter`], which decides
//! per URL whether to serve from cache or network and keeps two cache
//! namespaces up to date.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod network;
pub mod router;
pub mod telemetry;

pub use cache::{CacheResult, CacheStorage, MemoryStorage, ResponseSource, SqliteStorage};
pub use error::{Error, Result};
pub use http::{Destination, Request, Response};
pub use network::{Fetcher, HttpFetcher};
pub use router::{CacheRouter, ControlMessage, RouterOptions, Strategy};
