//! Caller identity attached to every transfer request

use ferry_core::TenantId;

/// Who is asking, as established by the host's authentication layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Administrator of their organization
    pub administrator: bool,
    /// Administrator of the whole deployment
    pub global_admin: bool,
    /// Caller's organization
    pub org_id: TenantId,
    /// Caller's user identifier, for logs
    pub user_id: String,
}

impl RequestContext {
    /// Ordinary member of `org_id`
    pub fn member(org_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            administrator: false,
            global_admin: false,
            org_id: TenantId::new(org_id),
            user_id: user_id.into(),
        }
    }

    /// Administrator of `org_id`
    pub fn admin(org_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            administrator: true,
            ..Self::member(org_id, user_id)
        }
    }

    /// Deployment-wide administrator whose home organization is `org_id`
    pub fn global_admin(org_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            global_admin: true,
            ..Self::admin(org_id, user_id)
        }
    }
}
