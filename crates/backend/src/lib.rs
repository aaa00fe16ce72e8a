//! Network transport to analysis back-ends.

pub mod http;
pub mod traits;

pub use http::HttpBackendClient;
pub use traits::{BackendClient, BackendError};
