//! Resolved caller identity

use serde::{Deserialize, Serialize};

/// How the caller authenticated
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuthMode {
    /// Shared secret, full bucket access
    SelfHosted,
    /// Signed claims, confined to a tenant prefix
    Cloud,
}

/// Which namespace a request targets
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyScope {
    /// The caller's own prefix
    #[default]
    Own,
    /// The shared team prefix
    Team,
}

impl KeyScope {
    /// Scope from the wire `useTeam` flag
    pub fn from_use_team(use_team: bool) -> Self {
        if use_team {
            Self::Team
        } else {
            Self::Own
        }
    }
}

/// Identity resolved for one request or connection
///
/// Built fresh by the credential resolver and never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    /// Authentication mode
    pub mode: AuthMode,
    /// Exclusive key-space root ("" for full bucket access)
    pub prefix: String,
    /// Optional shared team root
    pub team_prefix: Option<String>,
    /// Profile quota hint, 0 means unlimited
    pub profile_limit: u32,
}

impl UserContext {
    /// Context for a self-hosted deployment
    pub fn self_hosted() -> Self {
        Self {
            mode: AuthMode::SelfHosted,
            prefix: String::new(),
            team_prefix: None,
            profile_limit: 0,
        }
    }

    /// Context for a cloud tenant
    pub fn cloud(prefix: impl Into<String>, team_prefix: Option<String>, profile_limit: u32) -> Self {
        Self {
            mode: AuthMode::Cloud,
            prefix: prefix.into(),
            team_prefix,
            profile_limit,
        }
    }

    /// Root for the given scope, if the caller has one
    pub fn root(&self, scope: KeyScope) -> Option<&str> {
        match scope {
            KeyScope::Own => Some(&self.prefix),
            KeyScope::Team => self.team_prefix.as_deref(),
        }
    }

    /// Key used to partition per-tenant resources such as rate limits
    pub fn tenant_key(&self) -> &str {
        if self.prefix.is_empty() {
            "self-hosted"
        } else {
            &self.prefix
        }
    }
}
