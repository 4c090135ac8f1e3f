//! # topic-relay
//!
//! A small pub/sub relay: `POST /publish` wraps the request body in a
//! [`MessageEvent`](types::MessageEvent) and forwards it to a broker through a
//! sidecar, and a topic subscriber logs every message the sidecar delivers
//! back. A stateless health endpoint answers liveness probes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod broker;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod relay;
pub mod server;
pub mod types;

pub use error::{Error, Result};
