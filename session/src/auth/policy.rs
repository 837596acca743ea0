//! Accepted-role predicates for a portal deployment.
//!
//! The administrative portal only admits administrators while the staff and
//! resident portals admit any signed-in user; the difference is expressed as a
//! [`RolePolicy`] handed to the session context rather than hard-coded.

use crate::auth::models::{Identity, Role};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Predicate deciding whether an authenticated identity may use the portal.
#[derive(Clone)]
pub struct RolePolicy {
    name: String,
    predicate: Arc<dyn Fn(&Identity) -> bool + Send + Sync>,
}

impl RolePolicy {
    /// Admits every known role.
    pub fn any_authenticated() -> Self {
        Self::custom("any", |identity| identity.role != Role::Unknown)
    }

    pub fn admin_only() -> Self {
        Self::roles([Role::Admin])
    }

    /// Admits exactly the listed roles.
    pub fn roles(roles: impl IntoIterator<Item = Role>) -> Self {
        let roles: Vec<Role> = roles
            .into_iter()
            .filter(|role| *role != Role::Unknown)
            .collect();
        let name = roles
            .iter()
            .map(Role::as_str)
            .collect::<Vec<_>>()
            .join(",");
        Self::custom(name, move |identity| roles.contains(&identity.role))
    }

    pub fn custom(
        name: impl Into<String>,
        predicate: impl Fn(&Identity) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn allows(&self, identity: &Identity) -> bool {
        (self.predicate)(identity)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self::any_authenticated()
    }
}

impl fmt::Debug for RolePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RolePolicy").field(&self.name).finish()
    }
}

/// Parses `any` (or `*`) and comma-separated role lists such as `admin,staff`.
impl FromStr for RolePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("any") || s == "*" {
            return Ok(Self::any_authenticated());
        }

        let roles = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(Role::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::roles(roles))
    }
}
