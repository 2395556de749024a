//! # Bilderwald Library
//!
//! Directory indexing and metadata caching for large photo libraries.
//! Listings are served from a SQLite catalog when it is fresh enough and
//! rebuilt from disk when it is not; scans and thumbnail renders run on
//! worker threads so the async runtime stays responsive.
//!
//! ## Architecture
//!
//! The application is built using:
//! - **Axum**: HTTP server and routing
//! - **SQLx**: Asynchronous catalog access with SQLite
//! - **Tokio**: Async runtime for listings and background syncs
//! - **kamadak-exif / image**: Photo metadata and thumbnails
//!
//! ## Core Components
//!
//! - [`scanner`]: Reads one directory level plus child previews from disk
//! - [`worker`]: Executes scan and thumbnail tasks in-process or on a thread pool
//! - [`catalog`]: Persisted directories and photos, diff & merge of scans
//! - [`gallery`]: Staleness policy deciding between cache, rescan and "no change"
//! - [`config`]: Layered configuration
//! - [`db`]: Connection pool and schema
//! - [`error`]: Centralized error handling and HTTP error responses
//! - [`metrics`]: Indexing counters
//! - [`routes`]: HTTP API endpoint handlers
//! - [`state`]: Shared application state
//! - [`types`]: DTOs and shared type definitions

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod gallery;
pub mod metrics;
pub mod paths;
pub mod routes;
pub mod scanner;
pub mod state;
pub mod types;
pub mod worker;

#[cfg(test)]
mod tests;
