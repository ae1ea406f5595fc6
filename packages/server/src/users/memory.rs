use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::store::{Role, User, UserStore, UserStoreError};

/// In-memory user store for hermetic tests.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<Uuid, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn insert(&self, u: &User) -> Result<(), UserStoreError> {
        let mut guard = self.users.write().unwrap();
        if guard.values().any(|existing| existing.username == u.username) {
            return Err(UserStoreError::UsernameTaken);
        }
        guard.insert(u.id, u.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<User, UserStoreError> {
        self.users
            .read()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(UserStoreError::NotFound)
    }

    async fn get_by_username(&self, username: &str) -> Result<User, UserStoreError> {
        self.users
            .read()
            .unwrap()
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(UserStoreError::NotFound)
    }

    async fn list(&self) -> Result<Vec<User>, UserStoreError> {
        let mut users: Vec<User> = self.users.read().unwrap().values().cloned().collect();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(users)
    }

    async fn update(&self, u: &User) -> Result<(), UserStoreError> {
        let mut guard = self.users.write().unwrap();
        if !guard.contains_key(&u.id) {
            return Err(UserStoreError::NotFound);
        }
        guard.insert(u.id, u.clone());
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<(), UserStoreError> {
        self.users
            .write()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(UserStoreError::NotFound)
    }

    async fn count(&self) -> Result<u64, UserStoreError> {
        Ok(self.users.read().unwrap().len() as u64)
    }

    async fn set_last_login(&self, id: Uuid, when: DateTime<Utc>) -> Result<(), UserStoreError> {
        let mut guard = self.users.write().unwrap();
        let user = guard.get_mut(&id).ok_or(UserStoreError::NotFound)?;
        user.last_login = Some(when);
        Ok(())
    }

    async fn delete_by_role(&self, role: Role) -> Result<u64, UserStoreError> {
        let mut guard = self.users.write().unwrap();
        let before = guard.len();
        guard.retain(|_, u| u.role != role);
        Ok((before - guard.len()) as u64)
    }
}
