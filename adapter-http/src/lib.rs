pub mod apis;
pub mod client;
pub mod error;
pub mod http;

pub use client::HttpTransport;
pub use error::{ApiJson, ErrorResponse, ServerError};
pub use http::{build_app, start_server, ServerConfig, ServerState};
