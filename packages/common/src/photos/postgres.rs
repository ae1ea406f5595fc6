use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, QueryResult, Statement};
use tracing::{info, warn};
use uuid::Uuid;

use super::error::StoreError;
use super::{fold_row, ColumnPresence, NewPhoto, Photo, PhotoStore, RawPhotoRow};
use async_trait::async_trait;

/// Create the photos table and add the columns that older deployments lack.
///
/// The table is created with its original shape first; `deleted_at` and
/// `status` are probed and added individually, so a database written by any
/// earlier version converges to the current schema.
pub async fn ensure_schema<C: ConnectionTrait>(conn: &C) -> Result<(), StoreError> {
    conn.execute(Statement::from_string(
        DbBackend::Postgres,
        r#"
        CREATE TABLE IF NOT EXISTS photos (
            id UUID PRIMARY KEY,
            s3_key TEXT NOT NULL,
            filename TEXT,
            mime TEXT,
            created_at TIMESTAMPTZ DEFAULT NOW(),
            meta JSONB
        )
        "#
        .to_string(),
    ))
    .await?;

    if !column_exists(conn, "deleted_at").await? {
        conn.execute(Statement::from_string(
            DbBackend::Postgres,
            "ALTER TABLE photos ADD COLUMN deleted_at TIMESTAMPTZ".to_string(),
        ))
        .await?;
        info!("Added deleted_at column to photos table");
    }

    if !column_exists(conn, "status").await? {
        conn.execute(Statement::from_string(
            DbBackend::Postgres,
            "ALTER TABLE photos ADD COLUMN status TEXT DEFAULT 'active'".to_string(),
        ))
        .await?;
        info!("Added status column to photos table");
    }

    Ok(())
}

async fn column_exists<C: ConnectionTrait>(conn: &C, column: &str) -> Result<bool, StoreError> {
    let row = conn
        .query_one(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.columns
                WHERE table_name = 'photos' AND column_name = $1
            ) AS present
            "#,
            [column.into()],
        ))
        .await?;

    match row {
        Some(row) => row
            .try_get::<bool>("", "present")
            .map_err(StoreError::Database),
        None => Ok(false),
    }
}

/// Which listing a SELECT should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatusFilter {
    Active,
    Trashed,
    ById,
}

/// Build the tolerant SELECT for the photos table. Missing optional columns
/// are substituted with typed NULL / literal defaults so every row decodes
/// through the same path.
fn select_photos_sql(presence: &ColumnPresence, filter: StatusFilter) -> String {
    let mut sql = String::from("SELECT id, s3_key, filename, mime, created_at");

    if presence.deleted_at {
        sql.push_str(", deleted_at");
    } else {
        sql.push_str(", NULL::timestamptz AS deleted_at");
    }

    if presence.status {
        sql.push_str(", status");
    } else {
        sql.push_str(", 'active' AS status");
    }

    sql.push_str(", meta FROM photos");

    match filter {
        StatusFilter::Active => {
            if presence.status {
                sql.push_str(" WHERE status = 'active' OR status IS NULL");
            }
            sql.push_str(" ORDER BY created_at DESC");
        }
        StatusFilter::Trashed => {
            sql.push_str(" WHERE status = 'trashed'");
            if presence.deleted_at {
                sql.push_str(" ORDER BY deleted_at DESC NULLS LAST");
            } else {
                sql.push_str(" ORDER BY created_at DESC");
            }
        }
        StatusFilter::ById => {
            sql.push_str(" WHERE id = $1");
        }
    }

    sql
}

fn raw_from_query(row: &QueryResult) -> Result<RawPhotoRow, StoreError> {
    let decode = |e: sea_orm::DbErr| StoreError::Decode(e.to_string());
    Ok(RawPhotoRow {
        id: row.try_get::<Uuid>("", "id").map_err(decode)?,
        s3_key: row.try_get::<String>("", "s3_key").map_err(decode)?,
        filename: row.try_get::<Option<String>>("", "filename").map_err(decode)?,
        mime: row.try_get::<Option<String>>("", "mime").map_err(decode)?,
        created_at: row
            .try_get::<Option<DateTime<Utc>>>("", "created_at")
            .map_err(decode)?,
        deleted_at: row
            .try_get::<Option<DateTime<Utc>>>("", "deleted_at")
            .map_err(decode)?,
        status: row.try_get::<Option<String>>("", "status").map_err(decode)?,
        meta: row
            .try_get::<Option<serde_json::Value>>("", "meta")
            .map_err(decode)?,
    })
}

/// Postgres-backed photo store. Column presence is probed once at
/// construction; reads stay readable against older schemas.
#[derive(Debug, Clone)]
pub struct PgPhotoStore {
    db: DatabaseConnection,
    presence: ColumnPresence,
}

impl PgPhotoStore {
    /// Probe the deployed schema and build a store around it. Call
    /// [`ensure_schema`] first when schema bootstrap is wanted.
    pub async fn probe(db: DatabaseConnection) -> Result<Self, StoreError> {
        let presence = ColumnPresence {
            deleted_at: column_exists(&db, "deleted_at").await?,
            status: column_exists(&db, "status").await?,
        };
        Ok(Self { db, presence })
    }

    pub fn presence(&self) -> ColumnPresence {
        self.presence
    }

    /// After a zero-row state transition, decide whether the row was absent
    /// or merely in the wrong state.
    async fn classify_missed_update(
        &self,
        id: Uuid,
        conflict: &'static str,
    ) -> StoreError {
        let probe = self
            .db
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "SELECT status FROM photos WHERE id = $1",
                [id.into()],
            ))
            .await;

        match probe {
            Ok(Some(_)) => StoreError::conflict(format!("{conflict}: {id}")),
            Ok(None) => StoreError::NotFound(id),
            Err(e) => StoreError::Database(e),
        }
    }
}

#[async_trait]
impl PhotoStore for PgPhotoStore {
    async fn save_photo(&self, photo: &NewPhoto) -> Result<(), StoreError> {
        self.db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "INSERT INTO photos (id, s3_key, filename, mime) VALUES ($1, $2, $3, $4)",
                [
                    photo.id.into(),
                    photo.s3_key.clone().into(),
                    photo.filename.clone().into(),
                    photo.mime.clone().into(),
                ],
            ))
            .await?;
        Ok(())
    }

    async fn get_photo(&self, id: Uuid) -> Result<Photo, StoreError> {
        let sql = select_photos_sql(&self.presence, StatusFilter::ById);
        let row = self
            .db
            .query_one(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql.as_str(),
                [id.into()],
            ))
            .await?
            .ok_or(StoreError::NotFound(id))?;

        Ok(fold_row(&self.presence, raw_from_query(&row)?))
    }

    async fn delete_photo(&self, id: Uuid) -> Result<(), StoreError> {
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "DELETE FROM photos WHERE id = $1",
                [id.into()],
            ))
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn list_active(&self) -> Result<Vec<Photo>, StoreError> {
        let sql = select_photos_sql(&self.presence, StatusFilter::Active);
        let rows = self
            .db
            .query_all(Statement::from_string(DbBackend::Postgres, sql))
            .await?;

        rows.iter()
            .map(|row| Ok(fold_row(&self.presence, raw_from_query(row)?)))
            .collect()
    }

    async fn list_trashed(&self) -> Result<Vec<Photo>, StoreError> {
        if !self.presence.status {
            // Without a status column nothing can be trashed.
            warn!("status column missing, returning empty trash list");
            return Ok(Vec::new());
        }

        let sql = select_photos_sql(&self.presence, StatusFilter::Trashed);
        let rows = self
            .db
            .query_all(Statement::from_string(DbBackend::Postgres, sql))
            .await?;

        rows.iter()
            .map(|row| Ok(fold_row(&self.presence, raw_from_query(row)?)))
            .collect()
    }

    async fn trash_photo(&self, id: Uuid) -> Result<(), StoreError> {
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "UPDATE photos SET status = 'trashed', deleted_at = NOW() \
                 WHERE id = $1 AND status = 'active'",
                [id.into()],
            ))
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.classify_missed_update(id, "photo already trashed").await);
        }
        Ok(())
    }

    async fn restore_photo(&self, id: Uuid) -> Result<(), StoreError> {
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "UPDATE photos SET status = 'active', deleted_at = NULL \
                 WHERE id = $1 AND status = 'trashed'",
                [id.into()],
            ))
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.classify_missed_update(id, "photo not in trash").await);
        }
        Ok(())
    }

    async fn empty_trash(&self) -> Result<u64, StoreError> {
        let result = self
            .db
            .execute(Statement::from_string(
                DbBackend::Postgres,
                "DELETE FROM photos WHERE status = 'trashed'".to_string(),
            ))
            .await?;
        Ok(result.rows_affected())
    }

    async fn permanently_delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                "DELETE FROM photos WHERE id = $1 AND status = 'trashed'",
                [id.into()],
            ))
            .await?;

        if result.rows_affected() == 0 {
            return Err(self.classify_missed_update(id, "photo not in trash").await);
        }
        Ok(())
    }

    async fn merge_thumbnail(&self, id: Uuid, size: &str, key: &str) -> Result<(), StoreError> {
        let result = self
            .db
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                UPDATE photos
                SET meta = jsonb_set(
                    COALESCE(meta, '{}'::jsonb),
                    '{thumbnails}',
                    COALESCE(meta->'thumbnails', '{}'::jsonb) || jsonb_build_object($1::text, $2::text)
                )
                WHERE id = $3
                "#,
                [size.into(), key.into(), id.into()],
            ))
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
