//! 消息模型：请求消息与渲染消息部件
//!
//! 请求侧一条消息 = 角色 + 有序部件（文本或工具调用）；流式路径以 MessagePart
//! 为最小渲染单位，引用提取（citations）只扫描已完成的工具部件。

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 消息角色（与 LLM API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// 请求中的一条消息：角色 + 有序部件
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub role: Role,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

impl IncomingMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![MessagePart::Text { text: text.into() }],
        }
    }

    /// 该消息的第一个文本部件
    pub fn first_text(&self) -> Option<&str> {
        self.parts.iter().find_map(|p| match p {
            MessagePart::Text { text } => Some(text.as_str()),
            _ => None,
        })
    }

    /// 所有文本部件拼接（换行分隔），供转为 LLM 消息
    pub fn joined_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 工具调用生命周期状态（流式路径逐步推进）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToolCallState {
    InputStreaming,
    InputAvailable,
    OutputAvailable,
    OutputError,
}

/// 渲染消息部件：文本，或带状态的工具调用
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum MessagePart {
    Text {
        text: String,
    },
    Tool {
        tool: String,
        state: ToolCallState,
        #[serde(default)]
        input: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_text() {
        let msg = IncomingMessage {
            role: Role::User,
            parts: vec![
                MessagePart::Tool {
                    tool: "webSearch".to_string(),
                    state: ToolCallState::OutputAvailable,
                    input: json!({}),
                    output: None,
                    error: None,
                },
                MessagePart::Text {
                    text: "hello".to_string(),
                },
            ],
        };
        assert_eq!(msg.first_text(), Some("hello"));
    }

    #[test]
    fn test_part_wire_format() {
        let part = MessagePart::Text {
            text: "x".to_string(),
        };
        let v = serde_json::to_value(&part).unwrap();
        assert_eq!(v, json!({"type": "text", "text": "x"}));

        let part = MessagePart::Tool {
            tool: "webSearch".to_string(),
            state: ToolCallState::OutputAvailable,
            input: json!({"query": "q"}),
            output: Some(json!({"results": []})),
            error: None,
        };
        let v = serde_json::to_value(&part).unwrap();
        assert_eq!(v["type"], "tool");
        assert_eq!(v["state"], "output-available");
    }

    #[test]
    fn test_incoming_message_deserializes_without_parts() {
        let msg: IncomingMessage = serde_json::from_str(r#"{"role": "user"}"#).unwrap();
        assert!(msg.parts.is_empty());
        assert_eq!(msg.first_text(), None);
    }
}
