use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::user::{CreateUserRequest, UpdateUserRequest};

use super::store::{Role, User, UserStore, UserStoreError};

const DEFAULT_ADMIN_USERNAME: &str = "admin";
const DEFAULT_ADMIN_PASSWORD: &str = "admin123";

#[derive(Debug, Error)]
pub enum UserError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("account is inactive")]
    Inactive,

    #[error("user not found")]
    NotFound,

    #[error("user already exists")]
    AlreadyExists,

    #[error("cannot delete the last admin user")]
    LastAdmin,

    #[error(transparent)]
    Store(UserStoreError),

    #[error("password hash error: {0}")]
    Hash(String),
}

impl From<UserStoreError> for UserError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::NotFound => UserError::NotFound,
            UserStoreError::UsernameTaken => UserError::AlreadyExists,
            other => UserError::Store(other),
        }
    }
}

/// User CRUD plus the policy the store does not enforce: bcrypt hashing,
/// login verification, and the one-active-admin floor.
pub struct UserManager {
    store: Arc<dyn UserStore>,
}

impl UserManager {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Seed the default admin account when the users table is empty.
    pub async fn ensure_seed_admin(&self) -> Result<(), UserError> {
        if self.store.count().await? > 0 {
            return Ok(());
        }

        self.store.insert(&new_admin_user()?).await?;

        info!("===================================================================");
        info!("Created default admin user: username=admin, password=admin123");
        info!("Make sure to change this password after your first login!");
        info!("===================================================================");
        Ok(())
    }

    pub async fn create_user(&self, req: CreateUserRequest) -> Result<User, UserError> {
        let user = User {
            id: Uuid::new_v4(),
            username: req.username,
            email: req.email.filter(|e| !e.is_empty()),
            full_name: req.full_name.filter(|n| !n.is_empty()),
            password_hash: hash_password(&req.password)?,
            role: req.role.unwrap_or_default(),
            created_at: Utc::now(),
            last_login: None,
            active: true,
        };

        self.store.insert(&user).await?;
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, UserError> {
        Ok(self.store.get(id).await?)
    }

    pub async fn list_users(&self) -> Result<Vec<User>, UserError> {
        Ok(self.store.list().await?)
    }

    pub async fn update_user(&self, id: Uuid, req: UpdateUserRequest) -> Result<User, UserError> {
        let mut user = self.store.get(id).await?;

        if let Some(email) = req.email {
            user.email = Some(email).filter(|e| !e.is_empty());
        }
        if let Some(full_name) = req.full_name {
            user.full_name = Some(full_name).filter(|n| !n.is_empty());
        }
        if let Some(role) = req.role {
            user.role = role;
        }
        if let Some(active) = req.active {
            user.active = active;
        }
        if let Some(password) = req.password {
            user.password_hash = hash_password(&password)?;
        }

        self.store.update(&user).await?;
        Ok(user)
    }

    /// Delete a user. Never reduces the number of active admins below one.
    pub async fn delete_user(&self, id: Uuid) -> Result<(), UserError> {
        let users = self.store.list().await?;
        let target = users
            .iter()
            .find(|u| u.id == id)
            .ok_or(UserError::NotFound)?;

        if target.role == Role::Admin && target.active {
            let active_admins = users
                .iter()
                .filter(|u| u.role == Role::Admin && u.active)
                .count();
            if active_admins <= 1 {
                return Err(UserError::LastAdmin);
            }
        }

        Ok(self.store.delete(id).await?)
    }

    /// Verify a username/password pair. The failure is uniform whether the
    /// user is unknown or the password is wrong.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, UserError> {
        let user = match self.store.get_by_username(username).await {
            Ok(user) => user,
            Err(UserStoreError::NotFound) => return Err(UserError::InvalidCredentials),
            Err(e) => return Err(e.into()),
        };

        let valid = bcrypt::verify(password, &user.password_hash)
            .map_err(|e| UserError::Hash(e.to_string()))?;
        if !valid {
            return Err(UserError::InvalidCredentials);
        }

        if !user.active {
            return Err(UserError::Inactive);
        }

        let now = Utc::now();
        if let Err(e) = self.store.set_last_login(user.id, now).await {
            warn!(error = %e, "Failed to update last login time");
        }

        Ok(User {
            last_login: Some(now),
            ..user
        })
    }

    /// Break-glass recovery: drop every admin account and recreate the
    /// default one with a fresh password hash.
    pub async fn recreate_admin(&self) -> Result<(), UserError> {
        let removed = self.store.delete_by_role(Role::Admin).await?;
        if removed > 0 {
            info!(removed, "Deleted existing admin users");
        }

        self.store.insert(&new_admin_user()?).await?;

        info!("===================================================================");
        info!("Successfully recreated admin user");
        info!("Default credentials have been reset");
        info!("===================================================================");
        Ok(())
    }
}

fn new_admin_user() -> Result<User, UserError> {
    Ok(User {
        id: Uuid::new_v4(),
        username: DEFAULT_ADMIN_USERNAME.to_string(),
        email: Some("admin@example.com".to_string()),
        full_name: Some("Administrator".to_string()),
        password_hash: hash_password(DEFAULT_ADMIN_PASSWORD)?,
        role: Role::Admin,
        created_at: Utc::now(),
        last_login: None,
        active: true,
    })
}

fn hash_password(password: &str) -> Result<String, UserError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| UserError::Hash(e.to_string()))
}
