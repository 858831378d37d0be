//! User roles and the capabilities they grant.

use serde::{Deserialize, Serialize};

/// Flat role set. `Pending` accounts wait for an admin to promote them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Editor,
    Viewer,
    Pending,
}

impl Role {
    /// Role for a brand-new account given how many profiles already exist.
    pub fn for_new_account(existing_profiles: usize) -> Self {
        if existing_profiles == 0 {
            Self::Admin
        } else {
            Self::Pending
        }
    }

    pub fn capabilities(self) -> Capabilities {
        Capabilities {
            can_view: self != Self::Pending,
            can_edit: matches!(self, Self::Admin | Self::Editor),
            can_delete: self == Self::Admin,
            can_upload: self == Self::Admin,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Editor => "editor",
            Self::Viewer => "viewer",
            Self::Pending => "pending",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Self::Admin),
            "editor" => Ok(Self::Editor),
            "viewer" => Ok(Self::Viewer),
            "pending" => Ok(Self::Pending),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// What a role may do with contract content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub can_view: bool,
    pub can_edit: bool,
    pub can_delete: bool,
    pub can_upload: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub email: String,
    pub role: Role,
    /// ISO 8601 timestamp string.
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_account_is_admin() {
        assert_eq!(Role::for_new_account(0), Role::Admin);
        assert_eq!(Role::for_new_account(1), Role::Pending);
        assert_eq!(Role::for_new_account(40), Role::Pending);
    }

    #[test]
    fn capability_matrix() {
        let admin = Role::Admin.capabilities();
        assert!(admin.can_view && admin.can_edit && admin.can_delete && admin.can_upload);

        let editor = Role::Editor.capabilities();
        assert!(editor.can_view && editor.can_edit);
        assert!(!editor.can_delete && !editor.can_upload);

        let viewer = Role::Viewer.capabilities();
        assert!(viewer.can_view && !viewer.can_edit);

        let pending = Role::Pending.capabilities();
        assert!(!pending.can_view && !pending.can_edit && !pending.can_delete && !pending.can_upload);
    }

    #[test]
    fn role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Role::Editor).unwrap(), "\"editor\"");
        assert_eq!("Viewer".parse::<Role>().unwrap(), Role::Viewer);
        assert!("owner".parse::<Role>().is_err());
    }
}
