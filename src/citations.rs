//! 引用提取：从工具调用结果生成按出现顺序编号的来源列表
//!
//! 只扫描状态为 output-available 且带输出的工具部件；输出中取 `results`
//! 字段（缺失时退回 `search_results`）。无 url 的条目不可深链，直接跳过且
//! 不占用编号。每次提取从 "1" 重新编号，不跨消息累积，也不去重相同 url。

use serde::Serialize;
use serde_json::Value;

use crate::message::{MessagePart, ToolCallState};

/// 描述截断长度（字符）
const DESCRIPTION_CHARS: usize = 200;
/// 标题缺失时的回退标签
const FALLBACK_TITLE: &str = "Source";

/// 单条引用：编号从 "1" 起，与正文中的 [n] 标记对应
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Citation {
    pub number: String,
    pub title: String,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// 按部件顺序提取引用；同一输入重复调用结果相同（无内部状态）
pub fn extract_citations(parts: &[MessagePart]) -> Vec<Citation> {
    let mut citations = Vec::new();
    let mut index: usize = 1;

    for part in parts {
        let output = match part {
            MessagePart::Tool {
                state: ToolCallState::OutputAvailable,
                output: Some(output),
                ..
            } => output,
            _ => continue,
        };

        for entry in result_entries(output) {
            let url = entry
                .get("url")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if url.is_empty() {
                continue;
            }
            let title = entry
                .get("title")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .unwrap_or(FALLBACK_TITLE);
            let description = entry
                .get("content")
                .and_then(Value::as_str)
                .map(|c| c.chars().take(DESCRIPTION_CHARS).collect());
            citations.push(Citation {
                number: index.to_string(),
                title: title.to_string(),
                url: url.to_string(),
                description,
            });
            index += 1;
        }
    }

    citations
}

/// 输出中的结果条目：`results` 优先，其次 `search_results`
fn result_entries(output: &Value) -> &[Value] {
    output
        .get("results")
        .or_else(|| output.get("search_results"))
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool_part(output: Value) -> MessagePart {
        MessagePart::Tool {
            tool: "webSearch".to_string(),
            state: ToolCallState::OutputAvailable,
            input: json!({}),
            output: Some(output),
            error: None,
        }
    }

    #[test]
    fn test_numbering_across_parts_with_fallback_title() {
        // 三条带 url 的结果分布在两个工具部件中，B 缺标题；
        // 另有一条无 url 的结果不应占用编号
        let parts = vec![
            tool_part(json!({"results": [
                {"title": "A", "url": "https://a.example", "content": "alpha"},
                {"url": "https://b.example"},
            ]})),
            MessagePart::Text {
                text: "interleaved".to_string(),
            },
            tool_part(json!({"results": [
                {"title": "NoUrl", "content": "dropped"},
                {"title": "C", "url": "https://c.example"},
            ]})),
        ];

        let citations = extract_citations(&parts);
        assert_eq!(citations.len(), 3);
        assert_eq!(citations[0].number, "1");
        assert_eq!(citations[1].number, "2");
        assert_eq!(citations[1].title, "Source");
        assert_eq!(citations[2].number, "3");
        assert_eq!(citations[2].url, "https://c.example");
    }

    #[test]
    fn test_results_takes_precedence_over_search_results() {
        let parts = vec![tool_part(json!({
            "results": [{"title": "R", "url": "https://r.example"}],
            "search_results": [{"title": "S", "url": "https://s.example"}],
        }))];
        let citations = extract_citations(&parts);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].title, "R");
    }

    #[test]
    fn test_search_results_fallback() {
        let parts = vec![tool_part(json!({
            "search_results": [{"title": "S", "url": "https://s.example"}],
        }))];
        let citations = extract_citations(&parts);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].title, "S");
    }

    #[test]
    fn test_description_truncated_to_200_chars() {
        let long = "x".repeat(500);
        let parts = vec![tool_part(json!({"results": [
            {"title": "T", "url": "https://t.example", "content": long},
        ]}))];
        let citations = extract_citations(&parts);
        assert_eq!(citations[0].description.as_ref().unwrap().chars().count(), 200);
    }

    #[test]
    fn test_absent_content_gives_absent_description() {
        let parts = vec![tool_part(json!({"results": [
            {"title": "T", "url": "https://t.example"},
        ]}))];
        let citations = extract_citations(&parts);
        assert!(citations[0].description.is_none());
    }

    #[test]
    fn test_duplicate_urls_not_deduplicated() {
        let parts = vec![tool_part(json!({"results": [
            {"title": "T1", "url": "https://same.example"},
            {"title": "T2", "url": "https://same.example"},
        ]}))];
        let citations = extract_citations(&parts);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].number, "1");
        assert_eq!(citations[1].number, "2");
    }

    #[test]
    fn test_incomplete_or_failed_tool_parts_skipped() {
        let parts = vec![
            MessagePart::Tool {
                tool: "webSearch".to_string(),
                state: ToolCallState::InputAvailable,
                input: json!({}),
                output: Some(json!({"results": [{"url": "https://x.example"}]})),
                error: None,
            },
            MessagePart::Tool {
                tool: "webSearch".to_string(),
                state: ToolCallState::OutputError,
                input: json!({}),
                output: None,
                error: Some("boom".to_string()),
            },
        ];
        assert!(extract_citations(&parts).is_empty());
    }

    #[test]
    fn test_idempotent() {
        let parts = vec![tool_part(json!({"results": [
            {"title": "A", "url": "https://a.example", "content": "alpha"},
        ]}))];
        let first = extract_citations(&parts);
        let second = extract_citations(&parts);
        assert_eq!(first, second);
    }
}
