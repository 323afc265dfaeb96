//! 流式事件：NDJSON 路径上的最小事件集

use serde::Serialize;
use serde_json::Value;

use crate::citations::Citation;

/// 流式响应事件（每行一个 JSON 对象）
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// 文本增量
    TextDelta { delta: String },
    /// 工具调用入参已就绪（即将执行）
    ToolInputAvailable { tool: String, input: Value },
    /// 工具执行成功
    ToolOutputAvailable { tool: String, output: Value },
    /// 工具执行失败（流继续，模型会看到错误文本）
    ToolOutputError { tool: String, error: String },
    /// 本轮提取到的引用列表（终止序列第一项）
    Citations { citations: Vec<Citation> },
    /// 正常终止
    Done,
    /// 异常终止
    Error { error: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let v = serde_json::to_value(StreamEvent::TextDelta {
            delta: "hi".to_string(),
        })
        .unwrap();
        assert_eq!(v, json!({"type": "text_delta", "delta": "hi"}));

        let v = serde_json::to_value(StreamEvent::Done).unwrap();
        assert_eq!(v, json!({"type": "done"}));

        let v = serde_json::to_value(StreamEvent::Citations { citations: vec![] }).unwrap();
        assert_eq!(v["type"], "citations");
    }
}
