//! Delegation grants: who may act on whose behalf.

use ccn_types::{Address, Timestamp};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// What a grant covers. A single discriminant on one record type — scoping
/// fields that don't apply to a kind stay empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionKind {
    /// AGGREGATE writes, optionally scoped to aggregate keys.
    Aggregate,
    /// POST writes, optionally scoped to post types.
    Post,
    /// Compute-resource deployments.
    Vm,
    /// Full delegation: any message type.
    Delegate,
}

/// A time-bounded grant from `owner` to `grantee`.
///
/// "Currently valid" means `valid_from <= at < valid_until`. `None` scoping
/// fields mean unrestricted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub owner: Address,
    pub grantee: Address,
    pub kind: PermissionKind,
    pub valid_from: Timestamp,
    pub valid_until: Timestamp,
    /// Channels the grant is restricted to; `None` = any channel.
    pub channels: Option<Vec<String>>,
    /// Post types (POST) or aggregate keys (AGGREGATE) the grant covers.
    pub scopes: Option<Vec<String>>,
    pub create: bool,
    pub update: bool,
    pub delete: bool,
}

impl Permission {
    pub fn is_valid_at(&self, at: Timestamp) -> bool {
        self.valid_from <= at && at < self.valid_until
    }
}

/// Storage for grants, indexed by `(owner, grantee)`.
pub trait PermissionStore {
    fn put_permission(&self, permission: &Permission) -> Result<(), StoreError>;

    /// Every grant from `owner` to `grantee`, valid or not.
    fn grants_for(
        &self,
        owner: &Address,
        grantee: &Address,
    ) -> Result<Vec<Permission>, StoreError>;
}
