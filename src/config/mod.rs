//! # Configuration
//!
//! Service configuration loaded from environment variables.
//!
//! - `server`: [`ServerConfig`] for the HTTP service, the pipeline and logging

mod server;

pub use server::{LogFormat, ServerConfig};
