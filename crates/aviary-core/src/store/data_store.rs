//! Per-agent user-data collections.
//!
//! Documents are schemaless JSON rows grouped by collection name. Query
//! matching is top-level-key equality, applied in Rust after
//! deserialization — collections are small per-agent stores and this keeps
//! the SQL portable. Write operations touch the first matching document,
//! newest first.

use chrono::Utc;
use uuid::Uuid;

use crate::db::Database;
use crate::error::ServerError;

#[derive(Clone)]
pub struct DataStore {
    db: Database,
}

type JsonMap = serde_json::Map<String, serde_json::Value>;

fn matches_query(doc: &serde_json::Value, query: &JsonMap) -> bool {
    query.iter().all(|(key, expected)| doc.get(key) == Some(expected))
}

impl DataStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert a document, returning its generated id.
    pub async fn insert(
        &self,
        collection: &str,
        document: serde_json::Value,
    ) -> Result<String, ServerError> {
        if collection.is_empty() {
            return Err(ServerError::BadRequest(
                "Collection name must not be empty".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let body = serde_json::to_string(&document)
            .map_err(|e| ServerError::Internal(format!("Failed to serialize document: {}", e)))?;
        let collection = collection.to_string();
        let now = Utc::now().timestamp_millis();
        let row_id = id.clone();

        self.db
            .with_conn_async(move |conn| {
                conn.execute(
                    "INSERT INTO documents (id, collection, body, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?4)",
                    rusqlite::params![row_id, collection, body, now],
                )?;
                Ok(())
            })
            .await?;

        Ok(id)
    }

    /// Find documents matching the query (top-level key equality), newest
    /// first, up to `limit`. Each document carries its id under `_id`.
    pub async fn find(
        &self,
        collection: &str,
        query: Option<&JsonMap>,
        limit: usize,
    ) -> Result<Vec<serde_json::Value>, ServerError> {
        let collection = collection.to_string();
        let query = query.cloned();

        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, body FROM documents WHERE collection = ?1
                     ORDER BY created_at DESC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![collection], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                let mut documents = Vec::new();
                for (id, body) in rows {
                    let Ok(mut doc) = serde_json::from_str::<serde_json::Value>(&body) else {
                        continue;
                    };
                    if let Some(q) = &query {
                        if !matches_query(&doc, q) {
                            continue;
                        }
                    }
                    if let Some(obj) = doc.as_object_mut() {
                        obj.insert("_id".to_string(), serde_json::Value::String(id));
                    }
                    documents.push(doc);
                    if documents.len() >= limit {
                        break;
                    }
                }
                Ok(documents)
            })
            .await
    }

    /// Merge `update` into the first document matching `query`.
    /// Returns `(matched, modified)` counts.
    pub async fn update_first(
        &self,
        collection: &str,
        query: &JsonMap,
        update: &JsonMap,
    ) -> Result<(u64, u64), ServerError> {
        let collection = collection.to_string();
        let query = query.clone();
        let update = update.clone();
        let now = Utc::now().timestamp_millis();

        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, body FROM documents WHERE collection = ?1
                     ORDER BY created_at DESC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![collection], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                for (id, body) in rows {
                    let Ok(mut doc) = serde_json::from_str::<serde_json::Value>(&body) else {
                        continue;
                    };
                    if !matches_query(&doc, &query) {
                        continue;
                    }
                    if let Some(obj) = doc.as_object_mut() {
                        for (key, value) in &update {
                            obj.insert(key.clone(), value.clone());
                        }
                    }
                    let new_body = serde_json::to_string(&doc).unwrap_or(body);
                    conn.execute(
                        "UPDATE documents SET body = ?1, updated_at = ?2 WHERE id = ?3",
                        rusqlite::params![new_body, now, id],
                    )?;
                    return Ok((1, 1));
                }
                Ok((0, 0))
            })
            .await
    }

    /// Delete the first document matching `query`. Returns the deleted count.
    pub async fn delete_first(
        &self,
        collection: &str,
        query: &JsonMap,
    ) -> Result<u64, ServerError> {
        let collection = collection.to_string();
        let query = query.clone();

        self.db
            .with_conn_async(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, body FROM documents WHERE collection = ?1
                     ORDER BY created_at DESC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![collection], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                for (id, body) in rows {
                    let Ok(doc) = serde_json::from_str::<serde_json::Value>(&body) else {
                        continue;
                    };
                    if matches_query(&doc, &query) {
                        conn.execute(
                            "DELETE FROM documents WHERE id = ?1",
                            rusqlite::params![id],
                        )?;
                        return Ok(1);
                    }
                }
                Ok(0)
            })
            .await
    }

    /// Count documents matching the query.
    pub async fn count(
        &self,
        collection: &str,
        query: Option<&JsonMap>,
    ) -> Result<u64, ServerError> {
        match query {
            None => {
                let collection = collection.to_string();
                self.db
                    .with_conn_async(move |conn| {
                        let count: i64 = conn.query_row(
                            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                            rusqlite::params![collection],
                            |row| row.get(0),
                        )?;
                        Ok(count as u64)
                    })
                    .await
            }
            Some(q) => Ok(self.find(collection, Some(q), usize::MAX).await?.len() as u64),
        }
    }
}
