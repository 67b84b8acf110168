/*!
 * # Permissions Module
 *
 * Permission names used by the production routes and the seam through which
 * permission decisions are made.
 */

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

use crate::config::AuthConfig;

/// Permission actions
pub struct Actions;

impl Actions {
    pub const READ: &'static str = "read";
    pub const CREATE: &'static str = "create";
    pub const ALL: &'static str = "*";
}

/// Resource types
pub struct Resources;

impl Resources {
    pub const PRODUCTION: &'static str = "production";
}

/// Common permission string constants for compile-time safety
pub mod consts {
    pub const PRODUCTION_READ: &str = "production:read";
    pub const PRODUCTION_CREATE: &str = "production:create";
}

/// Format a permission string
pub fn format_permission(resource: &str, action: &str) -> String {
    format!("{}:{}", resource, action)
}

/// Answers whether a user holds a permission. Implementations are injected
/// into the router; nothing here reaches for global state.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    async fn has_permission(&self, user_id: &str, permission: &str) -> bool;
}

/// Grants loaded from configuration.
///
/// User ids are compared case-insensitively. The `"*"` user applies to every
/// caller, and a granted `"*"` or `"<resource>:*"` covers the matching
/// permissions.
#[derive(Debug, Clone, Default)]
pub struct StaticPermissionChecker {
    grants: HashMap<String, HashSet<String>>,
}

impl StaticPermissionChecker {
    pub fn new<I, U, P>(grants: I) -> Self
    where
        I: IntoIterator<Item = (U, Vec<P>)>,
        U: Into<String>,
        P: Into<String>,
    {
        let grants = grants
            .into_iter()
            .map(|(user, perms)| {
                (
                    user.into().to_ascii_lowercase(),
                    perms.into_iter().map(Into::into).collect(),
                )
            })
            .collect();
        Self { grants }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.grants.clone())
    }

    fn granted(&self, user_key: &str, permission: &str) -> bool {
        let Some(perms) = self.grants.get(user_key) else {
            return false;
        };

        if perms.contains(permission) || perms.contains(Actions::ALL) {
            return true;
        }

        permission
            .split_once(':')
            .map(|(resource, _)| perms.contains(&format_permission(resource, Actions::ALL)))
            .unwrap_or(false)
    }
}

#[async_trait]
impl PermissionChecker for StaticPermissionChecker {
    async fn has_permission(&self, user_id: &str, permission: &str) -> bool {
        self.granted(&user_id.to_ascii_lowercase(), permission) || self.granted("*", permission)
    }
}

#[cfg(test)]
mod tests {
    use super::consts::*;
    use super::*;
    use rstest::rstest;

    fn checker() -> StaticPermissionChecker {
        StaticPermissionChecker::new(vec![
            ("Chef-1", vec![PRODUCTION_READ]),
            ("planner", vec![PRODUCTION_READ, PRODUCTION_CREATE]),
            ("lead", vec!["production:*"]),
            ("admin", vec!["*"]),
        ])
    }

    #[rstest]
    #[case("chef-1", PRODUCTION_READ, true)]
    #[case("CHEF-1", PRODUCTION_READ, true)]
    #[case("chef-1", PRODUCTION_CREATE, false)]
    #[case("planner", PRODUCTION_CREATE, true)]
    #[case("lead", PRODUCTION_CREATE, true)]
    #[case("lead", "reports:read", false)]
    #[case("admin", "reports:read", true)]
    #[case("stranger", PRODUCTION_READ, false)]
    #[tokio::test]
    async fn static_grants(#[case] user: &str, #[case] permission: &str, #[case] expected: bool) {
        assert_eq!(checker().has_permission(user, permission).await, expected);
    }

    #[tokio::test]
    async fn wildcard_user_applies_to_everyone() {
        let checker = StaticPermissionChecker::new(vec![("*", vec![PRODUCTION_READ])]);
        assert!(checker.has_permission("anyone", PRODUCTION_READ).await);
        assert!(!checker.has_permission("anyone", PRODUCTION_CREATE).await);
    }
}
