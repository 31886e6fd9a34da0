use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::AuthResult;
use crate::error::GatewayError;

pub const INVALID_QUERY_PARAMS: &str = "Invalid query params";
pub const POLICY_EXISTS: &str = "Policy exists";
pub const POLICY_DOES_NOT_EXIST: &str = "Policy does not exist";

/// A subject-set: every subject holding `relation` on `namespace:object`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubjectSet {
    pub namespace: String,
    pub object: String,
    pub relation: String,
}

impl SubjectSet {
    pub fn new(
        namespace: impl Into<String>,
        object: impl Into<String>,
        relation: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            object: object.into(),
            relation: relation.into(),
        }
    }

    fn is_complete(&self) -> bool {
        !self.namespace.is_empty() && !self.object.is_empty() && !self.relation.is_empty()
    }
}

impl fmt::Display for SubjectSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}", self.namespace, self.object, self.relation)
    }
}

/// Who a check is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicySubject {
    Direct { subject_id: String },
    Set(SubjectSet),
}

impl PolicySubject {
    pub fn direct(subject_id: impl Into<String>) -> Self {
        Self::Direct {
            subject_id: subject_id.into(),
        }
    }

    /// Pick the subject variant from raw query fields.
    ///
    /// A non-empty `subject_id` wins; otherwise the set fields are used, even
    /// if some are empty, so that validation reports them.
    pub fn from_parts(
        subject_id: Option<&str>,
        set_namespace: Option<&str>,
        set_relation: Option<&str>,
        set_object: Option<&str>,
    ) -> Self {
        match subject_id {
            Some(id) if !id.is_empty() => Self::direct(id),
            _ => Self::Set(SubjectSet::new(
                set_namespace.unwrap_or_default(),
                set_object.unwrap_or_default(),
                set_relation.unwrap_or_default(),
            )),
        }
    }

    fn is_complete(&self) -> bool {
        match self {
            Self::Direct { subject_id } => !subject_id.is_empty(),
            Self::Set(set) => set.is_complete(),
        }
    }
}

impl fmt::Display for PolicySubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct { subject_id } => f.write_str(subject_id),
            Self::Set(set) => set.fmt(f),
        }
    }
}

/// A validated check: may `subject` hold `relation` on `namespace:object`?
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyCheckRequest {
    namespace: String,
    relation: String,
    object: String,
    subject: PolicySubject,
}

impl PolicyCheckRequest {
    /// All of namespace, relation and object must be non-empty, as must the
    /// subject's own fields.
    pub fn new(
        namespace: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
        subject: PolicySubject,
    ) -> AuthResult<Self> {
        let request = Self {
            namespace: namespace.into(),
            relation: relation.into(),
            object: object.into(),
            subject,
        };
        if !has_target(&request.namespace, &request.relation, &request.object)
            || !request.subject.is_complete()
        {
            return Err(GatewayError::bad_request(INVALID_QUERY_PARAMS));
        }
        Ok(request)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn subject(&self) -> &PolicySubject {
        &self.subject
    }

    pub fn to_tuple(&self) -> RelationTuple {
        RelationTuple {
            namespace: self.namespace.clone(),
            object: self.object.clone(),
            relation: self.relation.clone(),
            subject_id: match &self.subject {
                PolicySubject::Direct { subject_id } => Some(subject_id.clone()),
                PolicySubject::Set(_) => None,
            },
            subject_set: match &self.subject {
                PolicySubject::Direct { .. } => None,
                PolicySubject::Set(set) => Some(set.clone()),
            },
        }
    }
}

/// A validated expansion request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpansionRequest {
    namespace: String,
    relation: String,
    object: String,
    max_depth: Option<i32>,
}

impl ExpansionRequest {
    /// `max_depth` is `None` when the caller sent no depth; a depth that was
    /// sent must be a non-empty integer.
    pub fn new(
        namespace: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
        max_depth: Option<&str>,
    ) -> AuthResult<Self> {
        let namespace = namespace.into();
        let relation = relation.into();
        let object = object.into();
        if !has_target(&namespace, &relation, &object) {
            return Err(GatewayError::bad_request(INVALID_QUERY_PARAMS));
        }

        let max_depth = match max_depth {
            None => None,
            Some("") => return Err(GatewayError::bad_request(INVALID_QUERY_PARAMS)),
            Some(raw) => Some(raw.trim().parse::<i32>().map_err(|_| {
                GatewayError::bad_request(format!("Invalid max-depth '{raw}': not an integer"))
            })?),
        };

        Ok(Self {
            namespace,
            relation,
            object,
            max_depth,
        })
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn relation(&self) -> &str {
        &self.relation
    }

    pub fn object(&self) -> &str {
        &self.object
    }

    pub fn max_depth(&self) -> Option<i32> {
        self.max_depth
    }
}

fn has_target(namespace: &str, relation: &str, object: &str) -> bool {
    !namespace.is_empty() && !relation.is_empty() && !object.is_empty()
}

/// Reject a query missing any of namespace, relation or object.
pub fn require_target(namespace: &str, relation: &str, object: &str) -> AuthResult<()> {
    if has_target(namespace, relation, object) {
        Ok(())
    } else {
        Err(GatewayError::bad_request(INVALID_QUERY_PARAMS))
    }
}

/// A relation tuple as the policy service models it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RelationTuple {
    pub namespace: String,
    pub object: String,
    pub relation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject_set: Option<SubjectSet>,
}

impl fmt::Display for RelationTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}#{}@", self.namespace, self.object, self.relation)?;
        match (&self.subject_id, &self.subject_set) {
            (Some(id), _) => f.write_str(id),
            (None, Some(set)) => write!(f, "({set})"),
            (None, None) => Ok(()),
        }
    }
}

/// Binary outcome of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Forbidden,
}

impl Decision {
    pub fn from_allowed(allowed: bool) -> Self {
        if allowed { Self::Allowed } else { Self::Forbidden }
    }

    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allowed)
    }
}

/// A decision plus what is echoed back to the caller: the subject for a
/// direct check, a fixed message for a subject-set check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    pub decision: Decision,
    pub payload: String,
}

/// Result of an expansion. Both variants carry the upstream payload verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum ExpansionOutcome {
    Found(Value),
    /// The target has no policy tree.
    NotFound(Value),
}

impl ExpansionOutcome {
    pub fn into_payload(self) -> Value {
        match self {
            Self::Found(v) | Self::NotFound(v) => v,
        }
    }
}

/// Body of a check response. Other fields (`code`, `message`, ...) are ignored.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CheckResponse {
    #[serde(default)]
    pub allowed: bool,
}
