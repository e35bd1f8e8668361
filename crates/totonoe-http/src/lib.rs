//! HTTP transport for the Totonoe engine
//!
//! reqwest-based implementation of the engine's `Transport` contract.
//! Owns bearer-token authentication, JSON bodies, the mapping from HTTP
//! status codes onto the engine's distinguishable error kinds, and the
//! bounded retry on throttled (429) responses.

pub mod error;
pub mod transport;

pub use error::{HttpError, Result};
pub use transport::{HttpConfig, HttpTransport};
