use super::{document_id, DocumentStore};
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use libsql::{Builder, Connection, Database};
use serde_json::Value;
use tracing::info;

/// Turso/libSQL-backed document store. Each collection is a table of
/// `(seq, id, data)` rows with the document serialized as JSON text.
pub struct LibsqlStore {
    db: Database,
}

fn db_err(context: &str, e: impl std::fmt::Display) -> SyncError {
    SyncError::storage(format!("{context}: {e}"))
}

/// Collection names end up inside quoted identifiers.
fn quoted(name: &str) -> Result<String> {
    if name.is_empty() || name.contains('"') {
        return Err(SyncError::storage(format!("invalid collection name {name:?}")));
    }
    Ok(format!("\"{name}\""))
}

impl LibsqlStore {
    /// Create a new store with a connection to Turso
    pub async fn connect(url: &str, auth_token: &str) -> Result<Self> {
        info!("Connecting to Turso database at {}", url);

        let db = Builder::new_remote(url.to_string(), auth_token.to_string())
            .build()
            .await
            .map_err(|e| db_err("Failed to connect to database", e))?;

        Ok(Self { db })
    }

    fn connection(&self) -> Result<Connection> {
        self.db
            .connect()
            .map_err(|e| db_err("Failed to get database connection", e))
    }

    async fn table_exists(&self, conn: &Connection, name: &str) -> Result<bool> {
        let mut rows = conn
            .query(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
                libsql::params![name],
            )
            .await
            .map_err(|e| db_err("Failed to query tables", e))?;
        let row = rows.next().await.map_err(|e| db_err("Failed to read row", e))?;
        Ok(row.is_some())
    }

    async fn ensure_table(&self, conn: &Connection, name: &str) -> Result<()> {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} (seq INTEGER PRIMARY KEY, id TEXT NOT NULL UNIQUE, data TEXT NOT NULL)",
            quoted(name)?
        );
        conn.execute(&sql, ())
            .await
            .map_err(|e| db_err("Failed to create collection", e))?;
        Ok(())
    }

    async fn insert_with(&self, conn: &Connection, collection: &str, document: &Value) -> Result<()> {
        let id = document_id(document)?.to_string();
        let data = serde_json::to_string(document)?;
        let sql = format!("INSERT INTO {} (id, data) VALUES (?, ?)", quoted(collection)?);
        conn.execute(&sql, libsql::params![id, data])
            .await
            .map_err(|e| db_err("Failed to insert document", e))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for LibsqlStore {
    async fn find_one(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let conn = self.connection()?;
        if !self.table_exists(&conn, collection).await? {
            return Ok(None);
        }
        let sql = format!("SELECT data FROM {} WHERE id = ?", quoted(collection)?);
        let mut rows = conn
            .query(&sql, libsql::params![id])
            .await
            .map_err(|e| db_err("Failed to query document", e))?;

        match rows.next().await.map_err(|e| db_err("Failed to read row", e))? {
            Some(row) => {
                let data: String = row.get(0).map_err(|e| db_err("Failed to get data", e))?;
                Ok(Some(serde_json::from_str(&data)?))
            }
            None => Ok(None),
        }
    }

    async fn find_all(&self, collection: &str) -> Result<Vec<Value>> {
        let conn = self.connection()?;
        if !self.table_exists(&conn, collection).await? {
            return Ok(Vec::new());
        }
        let sql = format!("SELECT data FROM {} ORDER BY seq", quoted(collection)?);
        let mut rows = conn
            .query(&sql, ())
            .await
            .map_err(|e| db_err("Failed to query documents", e))?;

        let mut documents = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| db_err("Failed to read row", e))? {
            let data: String = row.get(0).map_err(|e| db_err("Failed to get data", e))?;
            documents.push(serde_json::from_str(&data)?);
        }
        Ok(documents)
    }

    async fn insert_one(&self, collection: &str, document: Value) -> Result<()> {
        let conn = self.connection()?;
        self.ensure_table(&conn, collection).await?;
        self.insert_with(&conn, collection, &document).await
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Value>) -> Result<()> {
        let conn = self.connection()?;
        self.ensure_table(&conn, collection).await?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| db_err("Failed to begin transaction", e))?;
        for document in &documents {
            self.insert_with(&tx, collection, document).await?;
        }
        tx.commit().await.map_err(|e| db_err("Failed to commit", e))?;
        Ok(())
    }

    async fn replace_one(&self, collection: &str, id: &str, document: Value) -> Result<bool> {
        let conn = self.connection()?;
        if !self.table_exists(&conn, collection).await? {
            return Ok(false);
        }
        let new_id = document_id(&document)?.to_string();
        let data = serde_json::to_string(&document)?;
        let sql = format!("UPDATE {} SET id = ?, data = ? WHERE id = ?", quoted(collection)?);
        let changed = conn
            .execute(&sql, libsql::params![new_id, data, id])
            .await
            .map_err(|e| db_err("Failed to replace document", e))?;
        Ok(changed > 0)
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<bool> {
        let conn = self.connection()?;
        if !self.table_exists(&conn, collection).await? {
            return Ok(false);
        }
        let sql = format!("DELETE FROM {} WHERE id = ?", quoted(collection)?);
        let changed = conn
            .execute(&sql, libsql::params![id])
            .await
            .map_err(|e| db_err("Failed to delete document", e))?;
        Ok(changed > 0)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let conn = self.connection()?;
        let mut rows = conn
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
                (),
            )
            .await
            .map_err(|e| db_err("Failed to list collections", e))?;

        let mut names = Vec::new();
        while let Some(row) = rows.next().await.map_err(|e| db_err("Failed to read row", e))? {
            names.push(row.get::<String>(0).map_err(|e| db_err("Failed to get name", e))?);
        }
        Ok(names)
    }

    async fn rename_collection(&self, from: &str, to: &str) -> Result<()> {
        let conn = self.connection()?;
        if self.table_exists(&conn, to).await? {
            return Err(SyncError::storage(format!("target collection {to} already exists")));
        }
        let sql = format!("ALTER TABLE {} RENAME TO {}", quoted(from)?, quoted(to)?);
        conn.execute(&sql, ())
            .await
            .map_err(|e| db_err("Failed to rename collection", e))?;
        Ok(())
    }

    async fn drop_collection(&self, name: &str) -> Result<()> {
        let conn = self.connection()?;
        let sql = format!("DROP TABLE IF EXISTS {}", quoted(name)?);
        conn.execute(&sql, ())
            .await
            .map_err(|e| db_err("Failed to drop collection", e))?;
        Ok(())
    }
}
