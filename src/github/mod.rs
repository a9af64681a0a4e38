//! GitHub Actions REST API: data models, the HTTP transport and the endpoints the pipeline calls.

mod client;
mod transport;
mod types;

pub use client::*;
pub use transport::*;
pub use types::*;
