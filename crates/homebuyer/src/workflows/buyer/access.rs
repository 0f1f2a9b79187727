use super::domain::{Caller, EntityKind, Role, UserId};

/// Who, besides the owner, may perform an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessPolicy {
    OwnerOrAdmin,
    OwnerOnly,
}

/// Basis on which an operation was allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grant {
    Owner,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessDenied {
    #[error("caller is not signed in")]
    Anonymous,
    #[error("{entity} belongs to another user")]
    NotOwner { entity: EntityKind },
    #[error("only the owner may change this {entity}")]
    OwnerOnly { entity: EntityKind },
}

/// Ownership predicate shared by every workflow operation.
pub fn permits(
    role: Role,
    caller_id: &UserId,
    owner_id: &UserId,
    policy: AccessPolicy,
) -> Option<Grant> {
    if caller_id == owner_id {
        return Some(Grant::Owner);
    }

    match (policy, role) {
        (AccessPolicy::OwnerOrAdmin, Role::Admin) => Some(Grant::Admin),
        _ => None,
    }
}

pub fn authenticated(caller: Option<&Caller>) -> Result<&Caller, AccessDenied> {
    caller.ok_or(AccessDenied::Anonymous)
}

pub fn authorize(
    caller: &Caller,
    owner_id: &UserId,
    entity: EntityKind,
    policy: AccessPolicy,
) -> Result<Grant, AccessDenied> {
    permits(caller.role, &caller.user_id, owner_id, policy).ok_or(
        // Admins can already see the entity, so naming the rule leaks nothing.
        if caller.is_admin() {
            AccessDenied::OwnerOnly { entity }
        } else {
            AccessDenied::NotOwner { entity }
        },
    )
}
