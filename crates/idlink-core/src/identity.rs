//! Identity references: one account on one side of the tenant boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LinkError;

/// Prefix used in the textual form for accounts that live in the host space.
const HOST_LABEL: &str = "host";

/// A (tenant, user) pair identifying one account.
///
/// `tenant_id == None` means the host (no-tenant) space. Equality is
/// structural, so two host references with the same user are equal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct IdentityRef {
    pub tenant_id: Option<Uuid>,
    pub user_id: Uuid,
}

impl IdentityRef {
    pub fn new(tenant_id: Option<Uuid>, user_id: Uuid) -> Self {
        Self { tenant_id, user_id }
    }

    /// A reference to an account in the host space.
    pub fn host(user_id: Uuid) -> Self {
        Self::new(None, user_id)
    }

    /// A reference to an account inside `tenant_id`.
    pub fn in_tenant(tenant_id: Uuid, user_id: Uuid) -> Self {
        Self::new(Some(tenant_id), user_id)
    }

    #[must_use]
    pub fn is_host(&self) -> bool {
        self.tenant_id.is_none()
    }
}

/// Formats as `host:<user>` or `<tenant>:<user>`.
impl fmt::Display for IdentityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tenant_id {
            Some(tenant) => write!(f, "{tenant}:{}", self.user_id),
            None => write!(f, "{HOST_LABEL}:{}", self.user_id),
        }
    }
}

impl FromStr for IdentityRef {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tenant, user) = s
            .trim()
            .split_once(':')
            .ok_or_else(|| LinkError::InvalidIdentity(format!("expected TENANT:USER, got '{s}'")))?;

        let tenant_id = if tenant.eq_ignore_ascii_case(HOST_LABEL) {
            None
        } else {
            Some(parse_uuid(tenant, "tenant")?)
        };
        let user_id = parse_uuid(user, "user")?;

        Ok(Self { tenant_id, user_id })
    }
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, LinkError> {
    Uuid::parse_str(raw)
        .map_err(|e| LinkError::InvalidIdentity(format!("bad {what} id '{raw}': {e}")))
}
