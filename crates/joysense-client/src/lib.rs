//! HTTP access to the JoySense backend read API
//!
//! [`HttpSource`] implements the core's source traits over the backend's
//! JSON endpoints; [`ClientConfig`] resolves where those endpoints live.

pub mod config;
pub mod error;
pub mod http;
pub mod wire;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::HttpSource;
