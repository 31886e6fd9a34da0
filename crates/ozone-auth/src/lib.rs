//! # ozone-auth
//!
//! Authentication resolution and policy decisions for the ozone gateway.
//!
//! A `check` request is resolved in two strictly sequential stages: the bearer
//! token is introspected with the issuer selected by the caller's hint (and
//! the resulting subject cached until shortly before the token expires), then
//! the subject is checked against the policy service.
//!
//! ## Modules
//!
//! - [`config`] - issuers, policy service endpoints and cache settings
//! - [`authn`] - bearer parsing, issuer registry and the authentication resolver
//! - [`cache`] - token to subject cache with TTL derived from token expiry
//! - [`policy`] - check and expand requests against the policy service
//! - [`gateway`] - the facade composing both resolvers under a request deadline
//! - [`http`] - axum handlers and router for the public API

pub mod authn;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod policy;

pub use authn::{AuthenticationResolver, IntrospectionResult, IssuerRegistry, parse_bearer};
pub use cache::{
    CacheStats, IntrospectionCache, LocalIntrospectionCache, NoOpIntrospectionCache,
    create_introspection_cache, introspection_expiry, introspection_ttl,
    spawn_cleanup_task,
};
pub use config::{
    AuthConfig, ConfigError, IntrospectionCacheConfig, IssuerConfig, PolicyServiceConfig,
};
pub use error::{ErrorCategory, GatewayError};
pub use gateway::{CheckQuery, ExpandQuery, Gateway, RelationQuery};
pub use http::{GatewayState, health_handler, router};
pub use policy::{
    Decision, ExpansionOutcome, ExpansionRequest, PolicyCheckRequest, PolicyDecision,
    PolicyResolver, PolicySubject, RelationTuple, SubjectSet,
};

/// Result type for request-scoped gateway operations.
pub type AuthResult<T> = Result<T, GatewayError>;

/// Prelude module for convenient imports.
///
/// ```ignore
/// use ozone_auth::prelude::*;
/// ```
pub mod prelude {
    pub use crate::AuthResult;
    pub use crate::authn::{AuthenticationResolver, IssuerRegistry};
    pub use crate::cache::{IntrospectionCache, create_introspection_cache};
    pub use crate::config::{AuthConfig, ConfigError};
    pub use crate::error::{ErrorCategory, GatewayError};
    pub use crate::gateway::{CheckQuery, ExpandQuery, Gateway, RelationQuery};
    pub use crate::policy::{Decision, ExpansionOutcome, PolicyDecision, PolicyResolver};
}
