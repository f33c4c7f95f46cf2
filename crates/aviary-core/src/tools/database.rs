//! DATABASE tool executor — document operations against the per-agent
//! user-data collections.

use async_trait::async_trait;
use chrono::Utc;

use crate::error::ToolError;
use crate::models::ToolDefinition;
use crate::store::DataStore;
use crate::tools::{ParamMap, ToolExecutor};

const DEFAULT_FIND_LIMIT: u64 = 10;

pub struct DatabaseExecutor {
    store: DataStore,
}

impl DatabaseExecutor {
    pub fn new(store: DataStore) -> Self {
        Self { store }
    }
}

/// Pick the operation: call params win over the tool's static config.
fn operation<'a>(tool: &'a ToolDefinition, params: &'a ParamMap) -> &'a str {
    params
        .get("operation")
        .and_then(|v| v.as_str())
        .or_else(|| tool.config.get("operation").and_then(|v| v.as_str()))
        .unwrap_or("find_documents")
}

fn required_str<'a>(params: &'a ParamMap, key: &str) -> Result<&'a str, ToolError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ToolError::Validation(format!("{} parameter is required", key)))
}

fn object_param(
    params: &ParamMap,
    key: &str,
) -> Result<Option<serde_json::Map<String, serde_json::Value>>, ToolError> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err(ToolError::Validation(format!(
            "{} parameter must be an object",
            key
        ))),
    }
}

#[async_trait]
impl ToolExecutor for DatabaseExecutor {
    async fn execute(
        &self,
        tool: &ToolDefinition,
        params: &ParamMap,
    ) -> Result<serde_json::Value, ToolError> {
        let op = operation(tool, params);
        let collection = required_str(params, "collection_name")?;
        let db_err =
            |e: crate::error::ServerError| ToolError::Execution(format!("Database operation failed: {}", e));

        let result = match op {
            "insert_document" => {
                let mut document = params
                    .get("document")
                    .cloned()
                    .ok_or_else(|| ToolError::Validation("document parameter is required".to_string()))?;
                if let Some(obj) = document.as_object_mut() {
                    obj.entry("created_at".to_string())
                        .or_insert_with(|| serde_json::json!(Utc::now().to_rfc3339()));
                }
                let id = self.store.insert(collection, document).await.map_err(db_err)?;
                serde_json::json!({
                    "success": true,
                    "inserted_id": id,
                    "message": "Document inserted successfully",
                })
            }
            "find_documents" => {
                let query = object_param(params, "query")?;
                let limit = params
                    .get("limit")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(DEFAULT_FIND_LIMIT);
                let documents = self
                    .store
                    .find(collection, query.as_ref(), limit as usize)
                    .await
                    .map_err(db_err)?;
                serde_json::json!({
                    "success": true,
                    "count": documents.len(),
                    "documents": documents,
                })
            }
            "update_document" => {
                let query = object_param(params, "query")?
                    .ok_or_else(|| ToolError::Validation("query parameter is required".to_string()))?;
                let update = object_param(params, "update")?
                    .ok_or_else(|| ToolError::Validation("update parameter is required".to_string()))?;
                let (matched, modified) = self
                    .store
                    .update_first(collection, &query, &update)
                    .await
                    .map_err(db_err)?;
                serde_json::json!({
                    "success": true,
                    "matched_count": matched,
                    "modified_count": modified,
                    "message": "Document updated successfully",
                })
            }
            "delete_document" => {
                let query = object_param(params, "query")?
                    .ok_or_else(|| ToolError::Validation("query parameter is required".to_string()))?;
                let deleted = self
                    .store
                    .delete_first(collection, &query)
                    .await
                    .map_err(db_err)?;
                serde_json::json!({
                    "success": true,
                    "deleted_count": deleted,
                    "message": "Document deleted successfully",
                })
            }
            "count_documents" => {
                let query = object_param(params, "query")?;
                let count = self
                    .store
                    .count(collection, query.as_ref())
                    .await
                    .map_err(db_err)?;
                serde_json::json!({ "success": true, "count": count })
            }
            other => {
                return Err(ToolError::Execution(format!("Unknown operation: {}", other)));
            }
        };

        tracing::info!("Database tool {} executed operation {}", tool.tool_id, op);
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use serde_json::json;

    use crate::db::Database;

    fn db_tool(config_op: Option<&str>) -> ToolDefinition {
        let mut config = HashMap::new();
        if let Some(op) = config_op {
            config.insert("operation".to_string(), json!(op));
        }
        ToolDefinition {
            tool_id: "user_db".to_string(),
            tool_type: "DATABASE".to_string(),
            name: "User DB".to_string(),
            description: String::new(),
            endpoint: None,
            url: None,
            auth: None,
            config,
        }
    }

    fn params(value: serde_json::Value) -> ParamMap {
        value
            .as_object()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn executor() -> DatabaseExecutor {
        DatabaseExecutor::new(DataStore::new(Database::open_in_memory().unwrap()))
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let exec = executor();
        let inserted = exec
            .execute(
                &db_tool(None),
                &params(json!({
                    "operation": "insert_document",
                    "collection_name": "meals",
                    "document": { "name": "breakfast", "kcal": 420 },
                })),
            )
            .await
            .unwrap();
        assert_eq!(inserted["success"], true);
        assert!(inserted["inserted_id"].is_string());

        let found = exec
            .execute(
                &db_tool(None),
                &params(json!({
                    "operation": "find_documents",
                    "collection_name": "meals",
                    "query": { "name": "breakfast" },
                })),
            )
            .await
            .unwrap();
        assert_eq!(found["count"], 1);
        // Timestamp added on insert when absent.
        assert!(found["documents"][0]["created_at"].is_string());
    }

    #[tokio::test]
    async fn test_operation_from_tool_config() {
        let exec = executor();
        let result = exec
            .execute(
                &db_tool(Some("count_documents")),
                &params(json!({ "collection_name": "meals" })),
            )
            .await
            .unwrap();
        assert_eq!(result["count"], 0);
    }

    #[tokio::test]
    async fn test_missing_collection_name() {
        let err = executor()
            .execute(&db_tool(None), &ParamMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[tokio::test]
    async fn test_unknown_operation() {
        let err = executor()
            .execute(
                &db_tool(None),
                &params(json!({
                    "operation": "drop_everything",
                    "collection_name": "meals",
                })),
            )
            .await
            .unwrap_err();
        match err {
            ToolError::Execution(msg) => assert!(msg.contains("Unknown operation")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let exec = executor();
        exec.execute(
            &db_tool(None),
            &params(json!({
                "operation": "insert_document",
                "collection_name": "meals",
                "document": { "name": "lunch" },
            })),
        )
        .await
        .unwrap();

        let updated = exec
            .execute(
                &db_tool(None),
                &params(json!({
                    "operation": "update_document",
                    "collection_name": "meals",
                    "query": { "name": "lunch" },
                    "update": { "kcal": 600 },
                })),
            )
            .await
            .unwrap();
        assert_eq!(updated["matched_count"], 1);

        let deleted = exec
            .execute(
                &db_tool(None),
                &params(json!({
                    "operation": "delete_document",
                    "collection_name": "meals",
                    "query": { "name": "lunch" },
                })),
            )
            .await
            .unwrap();
        assert_eq!(deleted["deleted_count"], 1);
    }
}
