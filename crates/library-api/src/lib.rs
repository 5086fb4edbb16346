//! library-api: HTTP layer of the library service
//!
//! This crate provides:
//! - REST endpoints for queries and mutations via Axum
//! - Server-sent event streams for the live subscriptions
//! - Middleware (request ids, request logging, metrics)
//! - Logging and Prometheus setup
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 library-api                 │
//! ├─────────────────────────────────────────────┤
//! │  http/          - Routes, extractor, errors │
//! │  middleware/    - Request id, logs, metrics │
//! │  observability/ - Subscriber, Prometheus    │
//! └─────────────────────────────────────────────┘
//! ```

pub mod http;
pub mod middleware;
pub mod observability;
