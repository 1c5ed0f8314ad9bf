//! Caller identity and role checks.
//!
//! Sessions live in the gateway in front of this service, which forwards the
//! authenticated user in `x-auth-user` / `x-auth-role`. Handlers receive an
//! [`AuthContext`] and decide capabilities with [`has_role`].

use std::str::FromStr;

use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::ApiError;

pub const USER_HEADER: &str = "x-auth-user";
pub const ROLE_HEADER: &str = "x-auth-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Writer,
    User,
}

impl FromStr for Role {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "writer" => Ok(Role::Writer),
            "user" => Ok(Role::User),
            _ => Err(ApiError::Unauthorized),
        }
    }
}

/// Roles allowed to create, change or delete releases and incidents.
pub const WRITE_ROLES: &[Role] = &[Role::Admin, Role::Writer];

pub fn has_role(role: Role, allowed: &[Role]) -> bool {
    allowed.contains(&role)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub username: String,
    pub role: Role,
}

impl AuthContext {
    pub fn new(username: impl Into<String>, role: Role) -> Self {
        Self {
            username: username.into(),
            role,
        }
    }

    pub fn require_write(&self) -> Result<(), ApiError> {
        if has_role(self.role, WRITE_ROLES) {
            Ok(())
        } else {
            tracing::warn!(user = %self.username, role = ?self.role, "write attempt without privileges");
            Err(ApiError::Forbidden(String::from("Write privileges required")))
        }
    }

    fn from_parts(parts: &Parts) -> Result<Self, ApiError> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let username = header(USER_HEADER).ok_or(ApiError::Unauthorized)?;
        let role = header(ROLE_HEADER).ok_or(ApiError::Unauthorized)?.parse()?;
        Ok(Self::new(username, role))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::from_parts(parts)
    }
}
