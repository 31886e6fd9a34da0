//! Authentication resolution: bearer token to subject.

mod bearer;
mod introspection;
mod issuer;
mod resolver;

pub use bearer::{BEARER_ABSENT, BEARER_MALFORMED, parse_bearer};
pub use introspection::IntrospectionResult;
pub use issuer::{Issuer, IssuerRegistry};
pub use resolver::{AuthenticationResolver, INTROSPECTION_SERVICE};
