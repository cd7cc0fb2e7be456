use tracing::warn;
use ulid::Ulid;

use crate::error::AppError;
use crate::users::model::{User, ROLE_USER};

/// Capabilities of an authenticated caller, as seen by access checks.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: Ulid,
    pub roles: Vec<String>,
    pub verified: bool,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        role == ROLE_USER || self.roles.iter().any(|r| r == role)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribute {
    /// Caller is verified and is the subject, and the subject is verified.
    IsVerifiedCheck,
    /// Caller holds `ROLE_USER` and is the subject.
    OwnerOnly,
    Role(&'static str),
}

pub fn is_granted(attribute: Attribute, principal: &Principal, subject: Option<&User>) -> bool {
    match attribute {
        Attribute::IsVerifiedCheck => {
            principal.verified
                && subject.is_some_and(|u| u.id() == principal.id && u.is_verified())
        }
        Attribute::OwnerOnly => {
            principal.has_role(ROLE_USER) && subject.is_some_and(|u| u.id() == principal.id)
        }
        Attribute::Role(role) => principal.has_role(role),
    }
}

pub fn deny_access_unless_granted(
    attribute: Attribute,
    principal: &Principal,
    subject: Option<&User>,
) -> Result<(), AppError> {
    if is_granted(attribute, principal, subject) {
        Ok(())
    } else {
        warn!(user_id = %principal.id, ?attribute, "access denied");
        Err(AppError::Forbidden)
    }
}
