//! HTTP 检索后端：统一的搜索提供方调用
//!
//! 所有检索工具共用一个 JSON POST 端点，按 search_type 区分类目。
//! 返回统一形状 { "results": [{title, url, content}, ...] }，content 按配置截断。
//! 提供方内部（排序、索引、计费）对本层不可见。

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::config::SearchSection;
use crate::tools::registry::{Tool, ToolId};

/// 统一检索工具：一个实例对应一次请求的 (工具, 结果上限)
pub struct ProviderSearchTool {
    id: ToolId,
    max_num_results: Option<u32>,
    endpoint: String,
    api_key_env: String,
    timeout: Duration,
    max_content_chars: usize,
    client: reqwest::Client,
}

/// 提供方请求体
#[derive(Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    search_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_num_results: Option<u32>,
}

impl ProviderSearchTool {
    pub fn new(
        id: ToolId,
        max_num_results: Option<u32>,
        search: &SearchSection,
        client: reqwest::Client,
    ) -> Self {
        Self {
            id,
            max_num_results,
            endpoint: search.endpoint.clone(),
            api_key_env: search.api_key_env.clone(),
            timeout: Duration::from_secs(search.timeout_secs),
            max_content_chars: search.max_content_chars,
            client,
        }
    }

    /// 提供方响应 -> 统一结果形状
    fn normalize_response(&self, body: Value) -> Value {
        let entries = body
            .get("results")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let results: Vec<Value> = entries
            .into_iter()
            .map(|entry| {
                let title = entry.get("title").and_then(Value::as_str).unwrap_or("");
                let url = entry.get("url").and_then(Value::as_str).unwrap_or("");
                let content: String = entry
                    .get("content")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .chars()
                    .take(self.max_content_chars)
                    .collect();
                json!({"title": title, "url": url, "content": content})
            })
            .collect();
        json!({ "results": results })
    }
}

#[async_trait]
impl Tool for ProviderSearchTool {
    fn name(&self) -> &str {
        self.id.wire_name()
    }

    fn description(&self) -> &str {
        self.id.description()
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<Value, String> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .filter(|q| !q.trim().is_empty())
            .ok_or_else(|| "missing required argument: query".to_string())?;

        let api_key = std::env::var(&self.api_key_env)
            .map_err(|_| format!("search provider API key not set ({})", self.api_key_env))?;

        let request = SearchRequest {
            query,
            search_type: self.id.search_type(),
            max_num_results: self.max_num_results,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("search request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            warn!(tool = self.name(), %status, "search provider returned error");
            return Err(format!("search provider returned {status}"));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("search response is not valid JSON: {e}"))?;
        let normalized = self.normalize_response(body);

        let count = normalized["results"].as_array().map(Vec::len).unwrap_or(0);
        // 审计行：工具名、类目、查询与结果数
        info!(
            tool = self.name(),
            search_type = self.id.search_type(),
            query,
            results = count,
            "tool executed"
        );

        Ok(normalized)
    }
}
