// Named text documents (the published report). Visibility is written with the row on creation;
// content updates leave it alone.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use sqlx::SqlitePool;

use super::SampleStore;
use crate::report::{Document, DocumentLookup, DocumentPublisher, DocumentSettings};

pub(super) async fn init_documents_table(pool: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            name TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            reason TEXT NOT NULL,
            listed INTEGER NOT NULL DEFAULT 0,
            permission TEXT NOT NULL DEFAULT 'inherit',
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

impl SampleStore {
    async fn fetch_document(&self, name: &str) -> anyhow::Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT name, content, listed, permission FROM documents WHERE name = $1",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let permission: String = row.try_get("permission")?;
        Ok(Some(Document {
            name: row.try_get("name")?,
            content: row.try_get("content")?,
            settings: DocumentSettings {
                listed: row.try_get::<i64, _>("listed")? != 0,
                permission: permission.parse()?,
            },
        }))
    }
}

#[async_trait]
impl DocumentPublisher for SampleStore {
    async fn fetch(&self, name: &str) -> DocumentLookup {
        match self.fetch_document(name).await {
            Ok(Some(doc)) => DocumentLookup::Found(doc),
            Ok(None) => DocumentLookup::NotFound,
            Err(e) => DocumentLookup::TransientError(e.to_string()),
        }
    }

    async fn create(
        &self,
        name: &str,
        content: &str,
        reason: &str,
        settings: DocumentSettings,
    ) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO documents (name, content, reason, listed, permission, updated_at) VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(name)
        .bind(content)
        .bind(reason)
        .bind(settings.listed as i64)
        .bind(settings.permission.as_str())
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await
        .map_err(|e| anyhow::anyhow!("create document {}: {}", name, e))?;
        Ok(())
    }

    async fn update(&self, name: &str, content: &str, reason: &str) -> anyhow::Result<()> {
        let r = sqlx::query(
            "UPDATE documents SET content = $2, reason = $3, updated_at = $4 WHERE name = $1",
        )
        .bind(name)
        .bind(content)
        .bind(reason)
        .bind(Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        anyhow::ensure!(r.rows_affected() == 1, "document {} does not exist", name);
        Ok(())
    }

    async fn set_settings(&self, name: &str, settings: DocumentSettings) -> anyhow::Result<()> {
        let r = sqlx::query("UPDATE documents SET listed = $2, permission = $3 WHERE name = $1")
            .bind(name)
            .bind(settings.listed as i64)
            .bind(settings.permission.as_str())
            .execute(&self.pool)
            .await?;
        anyhow::ensure!(r.rows_affected() == 1, "document {} does not exist", name);
        Ok(())
    }
}
