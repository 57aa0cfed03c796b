//! Caller identity and the resolver that supplies it to privileged reads
use super::error::LendingError;

/// Organisational identity of whoever invoked the current transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    org_id: String,
}

impl CallerIdentity {
    pub fn new(org_id: impl Into<String>) -> Self {
        Self {
            org_id: org_id.into(),
        }
    }

    pub fn org_id(&self) -> &str {
        &self.org_id
    }

    pub fn belongs_to(&self, org_id: &str) -> bool {
        !self.org_id.is_empty() && self.org_id == org_id
    }
}

/// Supplies the caller's identity from whatever context the transaction runs in.
pub trait IdentityResolver {
    fn resolve_org_identity(&self) -> Result<CallerIdentity, LendingError>;
}

impl IdentityResolver for CallerIdentity {
    fn resolve_org_identity(&self) -> Result<CallerIdentity, LendingError> {
        if self.org_id.is_empty() {
            return Err(LendingError::Authorization {
                caller: "<unknown>".into(),
                action: "present an organisational identity",
            });
        }
        Ok(self.clone())
    }
}
