//! Delegation permission resolution.
//!
//! Decides whether a sender may act on behalf of another address. Pure
//! reads over the permission table; no side effects.

use ccn_store::permissions::{Permission, PermissionKind, PermissionStore};
use ccn_store::StoreError;
use ccn_types::{Address, MessageType, Timestamp};

/// Which mutation the message performs, checked against the grant's flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrudOp {
    /// New content (posts, aggregates, pins, deployments).
    Create,
    /// Mutation of existing content (post amends, aggregate updates).
    Update,
    /// Removal (forgets).
    Delete,
}

/// Everything a grant is matched against.
#[derive(Clone, Debug)]
pub struct AuthRequest<'a> {
    pub sender: &'a Address,
    pub on_behalf_of: &'a Address,
    pub message_type: MessageType,
    pub op: CrudOp,
    pub channel: Option<&'a str>,
    /// Post type (POST) or aggregate key (AGGREGATE) being written.
    pub scope: Option<&'a str>,
    pub at: Timestamp,
}

/// Whether the sender is authorized to act for `on_behalf_of`.
///
/// Self-authorization is always granted. Otherwise every currently-valid
/// grant from `on_behalf_of` to the sender is checked; absence of a matching
/// grant means unauthorized.
pub fn is_authorized<S: PermissionStore + ?Sized>(
    store: &S,
    request: &AuthRequest<'_>,
) -> Result<bool, StoreError> {
    if request.sender == request.on_behalf_of {
        return Ok(true);
    }
    let grants = store.grants_for(request.on_behalf_of, request.sender)?;
    Ok(grants.iter().any(|grant| grant_matches(grant, request)))
}

fn grant_matches(grant: &Permission, request: &AuthRequest<'_>) -> bool {
    if !grant.is_valid_at(request.at) {
        return false;
    }
    if !op_allowed(grant, request.op) {
        return false;
    }
    if !kind_covers(grant.kind, request.message_type) {
        return false;
    }
    if let Some(channels) = &grant.channels {
        match request.channel {
            Some(channel) if channels.iter().any(|c| c == channel) => {}
            _ => return false,
        }
    }
    // Post-type / aggregate-key scoping applies to the scoped kinds only.
    if matches!(grant.kind, PermissionKind::Post | PermissionKind::Aggregate) {
        if let Some(scopes) = &grant.scopes {
            match request.scope {
                Some(scope) if scopes.iter().any(|s| s == scope) => {}
                _ => return false,
            }
        }
    }
    true
}

fn op_allowed(grant: &Permission, op: CrudOp) -> bool {
    match op {
        CrudOp::Create => grant.create,
        CrudOp::Update => grant.update,
        CrudOp::Delete => grant.delete,
    }
}

fn kind_covers(kind: PermissionKind, message_type: MessageType) -> bool {
    match kind {
        PermissionKind::Delegate => true,
        PermissionKind::Post => message_type == MessageType::Post,
        PermissionKind::Aggregate => message_type == MessageType::Aggregate,
        PermissionKind::Vm => message_type == MessageType::Resource,
    }
}
