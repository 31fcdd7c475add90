//! Well-known role names carried by user documents and JWT-authenticated
//! requests.

pub const ROLE_USER: &str = "user";
pub const ROLE_GUIDE: &str = "guide";
pub const ROLE_LEAD_GUIDE: &str = "lead-guide";
pub const ROLE_ADMIN: &str = "admin";

/// Every assignable role, lowest privilege first.
pub const ALL_ROLES: &[&str] = &[ROLE_USER, ROLE_GUIDE, ROLE_LEAD_GUIDE, ROLE_ADMIN];

pub fn is_valid_role(role: &str) -> bool {
    ALL_ROLES.contains(&role)
}
