use super::principal::Identity;

/// Role labels that mean "administrator" outright (compared case-insensitively).
pub const ADMIN_ROLE_NAMES: &[&str] = &["admin", "administrator", "bluevisionadmin", "superuser", "super_user"];

/// Roles that unlock trust management without being administrators (exact match).
pub const PRIVILEGED_ROLE_NAMES: &[&str] = &["publisher", "BlueVisionAdmin"];

/// The rule that classified an identity as administrator.
///
/// Rules are evaluated in declaration order and the first match wins. `LegacyAdminSubstring`
/// is broader than `KnownAdminRole` and must only ever be reached after the others fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminRule {
    ExplicitAdminFlag,
    StaffFlag,
    KnownAdminRole,
    LegacyAdminSubstring,
}

impl AdminRule {
    pub const ORDER: [AdminRule; 4] = [
        AdminRule::ExplicitAdminFlag,
        AdminRule::StaffFlag,
        AdminRule::KnownAdminRole,
        AdminRule::LegacyAdminSubstring,
    ];

    pub fn matches(self, identity: &Identity) -> bool {
        match self {
            AdminRule::ExplicitAdminFlag => identity.is_admin == Some(true),
            AdminRule::StaffFlag => identity.is_staff == Some(true),
            AdminRule::KnownAdminRole => identity.role_str()
                .map(|r| r.to_lowercase())
                .map(|r| ADMIN_ROLE_NAMES.contains(&r.as_str()))
                .unwrap_or(false),
            AdminRule::LegacyAdminSubstring => identity.role_str()
                .map(|r| r.to_lowercase().contains("admin"))
                .unwrap_or(false),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AdminRule::ExplicitAdminFlag => "explicit_admin_flag",
            AdminRule::StaffFlag => "staff_flag",
            AdminRule::KnownAdminRole => "known_admin_role",
            AdminRule::LegacyAdminSubstring => "legacy_admin_substring",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    pub is_admin: bool,
    /// Which rule fired; `None` when not an administrator.
    pub matched: Option<AdminRule>,
}

/// Derive the administrator flag for an identity (absent identity is never admin).
pub fn classify(identity: Option<&Identity>) -> Classification {
    let Some(id) = identity else { return Classification::default(); };
    match AdminRule::ORDER.iter().copied().find(|rule| rule.matches(id)) {
        Some(rule) => Classification { is_admin: true, matched: Some(rule) },
        None => Classification::default(),
    }
}

/// Privileged roles gain trust-management access below full administration.
pub fn has_privileged_role(identity: Option<&Identity>, is_admin: bool) -> bool {
    if is_admin { return true; }
    identity
        .and_then(|id| id.role_str())
        .map(|r| PRIVILEGED_ROLE_NAMES.contains(&r))
        .unwrap_or(false)
}
