//! RSS/Atom tool executor — fetches a feed URL and returns sanitized
//! entries.
//!
//! Entry fields are length-capped and stripped of dangerous characters, and
//! entry links are re-validated with the same URL policy applied to the
//! feed URL itself.

use async_trait::async_trait;

use crate::error::ToolError;
use crate::models::ToolDefinition;
use crate::tools::validate::{is_valid_url, sanitize_params, sanitize_text};
use crate::tools::{ParamMap, ToolExecutor};

/// Feeds above this size are rejected.
const MAX_FEED_BYTES: usize = 5 * 1024 * 1024;

const DEFAULT_ENTRY_LIMIT: u64 = 10;
const MAX_ENTRY_LIMIT: u64 = 100;

pub struct FeedExecutor {
    client: reqwest::Client,
}

impl FeedExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolExecutor for FeedExecutor {
    async fn execute(
        &self,
        tool: &ToolDefinition,
        params: &ParamMap,
    ) -> Result<serde_json::Value, ToolError> {
        let url = tool.url.as_deref().filter(|u| !u.is_empty()).ok_or_else(|| {
            ToolError::Validation(format!("Tool {} has no URL configured", tool.tool_id))
        })?;

        if !is_valid_url(url) {
            return Err(ToolError::Security(format!(
                "Invalid or potentially dangerous RSS URL: {}",
                url
            )));
        }

        let sanitized = sanitize_params(params)?;
        let limit = sanitized
            .get("limit")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_ENTRY_LIMIT)
            .min(MAX_ENTRY_LIMIT);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ToolError::Execution(format!("Timeout occurred for RSS tool {}", tool.tool_id))
            } else {
                ToolError::Execution(format!(
                    "Network error for RSS tool {}: {}",
                    tool.tool_id, e
                ))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Execution(format!(
                "HTTP error {} for RSS tool {}",
                status.as_u16(),
                tool.tool_id
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            ToolError::Execution(format!(
                "Failed to read feed for tool {}: {}",
                tool.tool_id, e
            ))
        })?;

        if bytes.len() > MAX_FEED_BYTES {
            return Err(ToolError::Execution(format!(
                "RSS feed too large for tool {}",
                tool.tool_id
            )));
        }

        let entries = parse_entries(&bytes, limit as usize, &tool.tool_id)?;
        tracing::info!(
            "RSS tool {} fetched {} entries",
            tool.tool_id,
            entries.len()
        );
        Ok(serde_json::json!({ "entries": entries }))
    }
}

/// Parse feed bytes into sanitized entry maps.
fn parse_entries(
    bytes: &[u8],
    limit: usize,
    tool_id: &str,
) -> Result<Vec<serde_json::Value>, ToolError> {
    let feed = feed_rs::parser::parse(bytes).map_err(|e| {
        ToolError::Execution(format!("Error parsing RSS feed for tool {}: {}", tool_id, e))
    })?;

    let entries = feed
        .entries
        .iter()
        .take(limit)
        .map(|entry| {
            let title = entry
                .title
                .as_ref()
                .map(|t| sanitize_text(&t.content, 200))
                .unwrap_or_default();
            let link = entry
                .links
                .first()
                .map(|l| l.href.clone())
                .filter(|href| is_valid_url(href))
                .unwrap_or_default();
            let description = entry
                .summary
                .as_ref()
                .map(|s| sanitize_text(&s.content, 500))
                .unwrap_or_default();
            let published = entry
                .published
                .or(entry.updated)
                .map(|d| d.to_rfc3339())
                .unwrap_or_default();
            let author = entry
                .authors
                .first()
                .map(|p| sanitize_text(&p.name, 100))
                .unwrap_or_default();

            serde_json::json!({
                "title": title,
                "link": link,
                "description": description,
                "published": published,
                "author": author,
            })
        })
        .collect();

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn rss_tool(url: Option<&str>) -> ToolDefinition {
        ToolDefinition {
            tool_id: "test_rss".to_string(),
            tool_type: "RSS".to_string(),
            name: "Test RSS".to_string(),
            description: "A test RSS feed".to_string(),
            endpoint: None,
            url: url.map(String::from),
            auth: None,
            config: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_missing_url() {
        let executor = FeedExecutor::new(reqwest::Client::new());
        let err = executor
            .execute(&rss_tool(None), &ParamMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation(_)));
    }

    #[tokio::test]
    async fn test_dangerous_url_rejected() {
        let executor = FeedExecutor::new(reqwest::Client::new());
        let err = executor
            .execute(&rss_tool(Some("http://localhost/rss.xml")), &ParamMap::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Security(_)));
    }

    const SAMPLE_RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0">
  <channel>
    <title>Example</title>
    <item>
      <title>Test Article &lt;script&gt;</title>
      <link>https://example.com/article1</link>
      <description>Test description</description>
      <pubDate>Mon, 01 Jan 2024 12:00:00 GMT</pubDate>
    </item>
    <item>
      <title>Local Link</title>
      <link>http://localhost/evil</link>
      <description>Entry with a disallowed link</description>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_parse_entries_sanitizes_fields() {
        let entries = parse_entries(SAMPLE_RSS.as_bytes(), 10, "test_rss").unwrap();
        assert_eq!(entries.len(), 2);
        let title = entries[0]["title"].as_str().unwrap();
        assert!(!title.contains('<'));
        assert_eq!(entries[0]["link"], "https://example.com/article1");
        // Disallowed entry link is dropped, not propagated.
        assert_eq!(entries[1]["link"], "");
    }

    #[test]
    fn test_parse_entries_respects_limit() {
        let entries = parse_entries(SAMPLE_RSS.as_bytes(), 1, "test_rss").unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_parse_entries_rejects_garbage() {
        assert!(parse_entries(b"not a feed at all", 10, "test_rss").is_err());
    }
}
