use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Staff and guardian roles recognised by the backend.
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_RECEPTIONIST: &str = "receptionist";
pub const ROLE_THERAPIST: &str = "therapist";
pub const ROLE_PARENT: &str = "parent";

#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<u64>,
    pub email: Option<String>,
    pub role: Option<String>,
    pub iat: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub role: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }

    /// Admins and receptionists manage the whole appointment book.
    pub fn is_staff_admin(&self) -> bool {
        self.has_role(ROLE_ADMIN) || self.has_role(ROLE_RECEPTIONIST)
    }
}
