//! Authenticated identity, as asserted by the upstream auth gateway.
//!
//! Authentication itself is out of scope here: the gateway in front of this
//! service validates the session and forwards the identity as trusted
//! headers. The submitter's email is taken from this identity as the
//! notification address.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::IntoResponse,
};

pub const HEADER_USER_ID: &str = "x-auth-user-id";
pub const HEADER_USER_EMAIL: &str = "x-auth-email";
pub const HEADER_USER_ROLE: &str = "x-auth-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserRole {
    Admin,
    User,
}

impl UserRole {
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "admin" => Some(UserRole::Admin),
            "user" => Some(UserRole::User),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub email: String,
    pub role: UserRole,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

pub enum IdentityExtractionError {
    AccessDenied,
}

impl IntoResponse for IdentityExtractionError {
    fn into_response(self) -> axum::response::Response {
        match self {
            IdentityExtractionError::AccessDenied => StatusCode::FORBIDDEN.into_response(),
        }
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn extract_identity(parts: &Parts) -> Option<Identity> {
    let user_id = header_value(parts, HEADER_USER_ID)?;
    let email = header_value(parts, HEADER_USER_EMAIL)?;
    let role = UserRole::from_str(&header_value(parts, HEADER_USER_ROLE)?)?;
    Some(Identity {
        user_id,
        email,
        role,
    })
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = IdentityExtractionError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_identity(parts).ok_or(IdentityExtractionError::AccessDenied)
    }
}

/// An identity that must carry the admin role.
pub struct AdminIdentity(pub Identity);

impl<S: Send + Sync> FromRequestParts<S> for AdminIdentity {
    type Rejection = IdentityExtractionError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let identity = Identity::from_request_parts(parts, state).await?;
        if !identity.is_admin() {
            return Err(IdentityExtractionError::AccessDenied);
        }
        Ok(AdminIdentity(identity))
    }
}
