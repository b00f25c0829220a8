use serde::{Deserialize, Serialize};

use super::user::UserRole;

/// Claims embedded in the session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub role: UserRole,
    pub division: Option<String>,
    pub exp: usize,
    pub iat: usize,
}

/// Extracted from the validated session token through the axum extractor.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub username: String,
    pub role: UserRole,
    pub division: Option<String>,
}
