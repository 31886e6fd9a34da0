//! Policy decisions against the relation-tuple policy service.
//!
//! Three operations share one shape: validate the query, send it upstream,
//! interpret the answer. A denial is a [`Decision::Forbidden`] and a missing
//! policy tree an [`ExpansionOutcome::NotFound`]; neither is an error.

mod resolver;
mod types;

pub use resolver::{POLICY_SERVICE, PolicyResolver};
pub use types::{
    Decision, ExpansionOutcome, ExpansionRequest, INVALID_QUERY_PARAMS, POLICY_DOES_NOT_EXIST,
    POLICY_EXISTS, PolicyCheckRequest, PolicyDecision, PolicySubject, RelationTuple, SubjectSet,
    require_target,
};
