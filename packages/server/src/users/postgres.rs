use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, SqlErr,
};
use uuid::Uuid;

use crate::entity::user;

use super::store::{Role, User, UserStore, UserStoreError};

/// Users table access through the ORM entity.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    db: DatabaseConnection,
}

impl PgUserStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl From<user::Model> for User {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            email: model.email,
            full_name: model.full_name,
            password_hash: model.password_hash,
            role: Role::parse(&model.role),
            created_at: model.created_at,
            last_login: model.last_login,
            active: model.active,
        }
    }
}

fn to_active_model(u: &User) -> user::ActiveModel {
    user::ActiveModel {
        id: Set(u.id),
        username: Set(u.username.clone()),
        password_hash: Set(u.password_hash.clone()),
        email: Set(u.email.clone()),
        full_name: Set(u.full_name.clone()),
        role: Set(u.role.as_str().to_string()),
        created_at: Set(u.created_at),
        last_login: Set(u.last_login),
        active: Set(u.active),
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn insert(&self, u: &User) -> Result<(), UserStoreError> {
        to_active_model(u)
            .insert(&self.db)
            .await
            .map(|_| ())
            .map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => UserStoreError::UsernameTaken,
                _ => UserStoreError::Database(e),
            })
    }

    async fn get(&self, id: Uuid) -> Result<User, UserStoreError> {
        user::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(User::from)
            .ok_or(UserStoreError::NotFound)
    }

    async fn get_by_username(&self, username: &str) -> Result<User, UserStoreError> {
        user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .one(&self.db)
            .await?
            .map(User::from)
            .ok_or(UserStoreError::NotFound)
    }

    async fn list(&self) -> Result<Vec<User>, UserStoreError> {
        let models = user::Entity::find()
            .order_by_asc(user::Column::Username)
            .all(&self.db)
            .await?;
        Ok(models.into_iter().map(User::from).collect())
    }

    async fn update(&self, u: &User) -> Result<(), UserStoreError> {
        to_active_model(u)
            .update(&self.db)
            .await
            .map(|_| ())
            .map_err(|e| match e {
                DbErr::RecordNotUpdated => UserStoreError::NotFound,
                _ => UserStoreError::Database(e),
            })
    }

    async fn delete(&self, id: Uuid) -> Result<(), UserStoreError> {
        let result = user::Entity::delete_by_id(id).exec(&self.db).await?;
        if result.rows_affected == 0 {
            return Err(UserStoreError::NotFound);
        }
        Ok(())
    }

    async fn count(&self) -> Result<u64, UserStoreError> {
        Ok(user::Entity::find().count(&self.db).await?)
    }

    async fn set_last_login(&self, id: Uuid, when: DateTime<Utc>) -> Result<(), UserStoreError> {
        let update = user::ActiveModel {
            id: Set(id),
            last_login: Set(Some(when)),
            ..Default::default()
        };
        update.update(&self.db).await.map(|_| ()).map_err(|e| match e {
            DbErr::RecordNotUpdated => UserStoreError::NotFound,
            _ => UserStoreError::Database(e),
        })
    }

    async fn delete_by_role(&self, role: Role) -> Result<u64, UserStoreError> {
        let result = user::Entity::delete_many()
            .filter(user::Column::Role.eq(role.as_str()))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
