use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use serde_json::json;

use super::auth::AuthRejection;
use crate::models::{auth::AuthenticatedUser, user::UserRole};

async fn require<S: Send + Sync>(
    parts: &mut Parts,
    state: &S,
    role: UserRole,
) -> Result<AuthenticatedUser, AuthRejection> {
    let user = AuthenticatedUser::from_request_parts(parts, state).await?;
    if user.role != role {
        return Err((
            StatusCode::FORBIDDEN,
            Json(json!({ "error": format!("This page is only available to {} users", role) })),
        ));
    }
    Ok(user)
}

/// Session user whose role is `faculty`.
pub struct FacultyUser(pub AuthenticatedUser);

/// Session user whose role is `student`.
pub struct StudentUser(pub AuthenticatedUser);

/// Session user whose role is `admin`.
pub struct AdminUser(pub AuthenticatedUser);

impl<S: Send + Sync> FromRequestParts<S> for FacultyUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        require(parts, state, UserRole::Faculty).await.map(FacultyUser)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for StudentUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        require(parts, state, UserRole::Student).await.map(StudentUser)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AdminUser {
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        require(parts, state, UserRole::Admin).await.map(AdminUser)
    }
}
