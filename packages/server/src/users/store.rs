use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }

    pub fn parse(value: &str) -> Role {
        match value {
            "admin" => Role::Admin,
            _ => Role::User,
        }
    }
}

impl Default for Role {
    fn default() -> Self {
        Role::User
    }
}

/// A user account. The password hash never leaves the server.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub active: bool,
}

#[derive(Debug, Error)]
pub enum UserStoreError {
    #[error("user not found")]
    NotFound,

    #[error("username already taken")]
    UsernameTaken,

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Typed access to the users table.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert(&self, user: &User) -> Result<(), UserStoreError>;
    async fn get(&self, id: Uuid) -> Result<User, UserStoreError>;
    async fn get_by_username(&self, username: &str) -> Result<User, UserStoreError>;
    /// All users, ordered by username.
    async fn list(&self) -> Result<Vec<User>, UserStoreError>;
    async fn update(&self, user: &User) -> Result<(), UserStoreError>;
    async fn delete(&self, id: Uuid) -> Result<(), UserStoreError>;
    async fn count(&self) -> Result<u64, UserStoreError>;
    /// Best-effort login bookkeeping.
    async fn set_last_login(&self, id: Uuid, when: DateTime<Utc>) -> Result<(), UserStoreError>;
    /// Remove every user with the given role; returns how many were removed.
    async fn delete_by_role(&self, role: Role) -> Result<u64, UserStoreError>;
}
