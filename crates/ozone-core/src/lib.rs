//! # ozone-core
//!
//! Leaf plumbing shared by the ozone resolvers.
//!
//! - [`upstream`] - HTTP request executor used to talk to the introspection
//!   and policy services, with a hard per-call timeout
//! - [`propagation`] - W3C trace-context injection into outbound headers
//! - [`error`] - transport-level failures of an upstream call

pub mod error;
pub mod propagation;
pub mod upstream;

pub use error::UpstreamError;
pub use reqwest::header;
pub use upstream::{UpstreamClient, UpstreamRequest, UpstreamResponse};
