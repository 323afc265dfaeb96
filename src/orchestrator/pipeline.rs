//! 检索-结构化管线：两段严格串行的模型调用
//!
//! 第一段（取证）只负责调工具：步数上限 MAX_EVIDENCE_STEPS，收集所有步骤的
//! 工具结果并归一化（{result: T} 解包为 T，裸 T 透传）。第二段（结构化）不带
//! 工具，以 Raw Search Data / LLM Summary / User Query / Desired Structure
//! 组成合成提示词。schema 解析失败降级 schemaless；任一段调用失败整体中止，
//! 绝不返回半成品对象。

use std::sync::Arc;

use futures_util::StreamExt;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::PlaygroundError;
use crate::llm::{ChatMessage, LlmClient, StepRequest, ToolSpec};
use crate::message::IncomingMessage;
use crate::schema::{resolve_schema, ResolvedSchema};
use crate::tools::Tool;

/// 取证阶段的最大模型步数（比会话路径更紧：这一段只该调工具）
pub const MAX_EVIDENCE_STEPS: usize = 5;

const NO_RESULTS_SENTINEL: &str = "no results available";

/// 工具结果归一化：{result: T} 解包，裸值透传
pub fn normalize_tool_result(value: Value) -> Value {
    match value {
        Value::Object(ref map) if map.contains_key("result") => map["result"].clone(),
        other => other,
    }
}

/// 取证阶段产物
struct Evidence {
    raw_block: String,
    summary: String,
}

async fn gather_evidence(
    llm: &dyn LlmClient,
    tool: &dyn Tool,
    model: &str,
    query: &str,
) -> Result<Evidence, PlaygroundError> {
    let spec = ToolSpec {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters_schema(),
    };
    let mut conversation = vec![
        ChatMessage::System(format!(
            "Use the {} tool to find information relevant to the user's query.",
            tool.name()
        )),
        ChatMessage::User(query.to_string()),
    ];

    let mut collected: Vec<Value> = Vec::new();
    let mut summary = String::new();

    for step in 0..MAX_EVIDENCE_STEPS {
        let req = StepRequest::new(model, conversation.clone()).with_tool(spec.clone());
        let outcome = llm.step(&req).await?;
        if !outcome.text.is_empty() {
            summary = outcome.text.clone();
        }
        if outcome.tool_calls.is_empty() {
            debug!(step, collected = collected.len(), "evidence phase settled");
            break;
        }

        conversation.push(ChatMessage::Assistant {
            text: outcome.text.clone(),
            tool_calls: outcome.tool_calls.clone(),
        });
        for call in &outcome.tool_calls {
            match tool.execute(call.arguments.clone()).await {
                Ok(output) => {
                    let normalized = normalize_tool_result(output);
                    conversation.push(ChatMessage::ToolResult {
                        call_id: call.id.clone(),
                        content: normalized.to_string(),
                    });
                    collected.push(normalized);
                }
                Err(e) => {
                    conversation.push(ChatMessage::ToolResult {
                        call_id: call.id.clone(),
                        content: format!("Tool execution failed: {e}"),
                    });
                }
            }
        }
    }

    // 原始块回退链：结果 JSON -> 模型自述 -> 哨兵文本
    let raw_block = if !collected.is_empty() {
        serde_json::to_string_pretty(&Value::Array(collected))
            .map_err(|e| PlaygroundError::MalformedOutput(e.to_string()))?
    } else if !summary.trim().is_empty() {
        summary.clone()
    } else {
        NO_RESULTS_SENTINEL.to_string()
    };

    Ok(Evidence { raw_block, summary })
}

/// 合成提示词：取证产物 + 原始查询 + 可选结构期望
fn build_synthesis_prompt(evidence: &Evidence, query: &str, structure_hint: Option<&str>) -> String {
    let mut prompt = format!(
        "Raw Search Data:\n{}\n\nLLM Summary:\n{}\n\nUser Query:\n{}",
        evidence.raw_block, evidence.summary, query
    );
    if let Some(hint) = structure_hint {
        prompt.push_str("\n\nDesired Structure:\n");
        prompt.push_str(hint);
    }
    prompt
}

/// 结构化指令：有 schema 时点名字段、要求逐字保留
fn synthesis_instruction(resolved: &ResolvedSchema) -> String {
    let field_names = resolved.field_names();
    if field_names.is_empty() {
        "Extract the information into a well-structured JSON object that best fits the data."
            .to_string()
    } else {
        format!(
            "Extract the information into a JSON object. Use exactly these top-level field \
             names, preserved verbatim: {}.",
            field_names.join(", ")
        )
    }
}

/// 运行管线，返回最终对象（流式子模式在服务端排空，只返回最终快照）
pub async fn run_pipeline(
    llm: &dyn LlmClient,
    tool: Arc<dyn Tool>,
    model: &str,
    messages: &[IncomingMessage],
    schema_text: Option<&str>,
    schema_prompt: Option<&str>,
    streaming: bool,
) -> Result<Value, PlaygroundError> {
    let query = messages
        .first()
        .and_then(IncomingMessage::first_text)
        .unwrap_or("");

    let evidence = gather_evidence(llm, tool.as_ref(), model, query).await?;

    let resolved = resolve_schema(schema_text);
    // 结构期望：显式 schema 文本优先，否则使用自然语言提示
    let structure_hint = resolved.text().or(schema_prompt);
    let req = StepRequest::new(
        model,
        vec![
            ChatMessage::System(synthesis_instruction(&resolved)),
            ChatMessage::User(build_synthesis_prompt(&evidence, query, structure_hint)),
        ],
    );
    let spec = resolved.object_spec();

    let object = if streaming {
        // 排空整个增量流，只解析最终快照
        let mut stream = llm.complete_object_stream(&req, &spec).await?;
        let mut buf = String::new();
        while let Some(chunk) = stream.next().await {
            buf.push_str(&chunk?);
        }
        serde_json::from_str(&buf).map_err(|e| PlaygroundError::MalformedOutput(e.to_string()))?
    } else {
        llm.complete_object(&req, &spec).await?
    };

    info!(
        tool = tool.name(),
        model, streaming, "pipeline completed"
    );
    Ok(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ScriptedLlmClient, StepOutcome, ToolCallRequest};
    use async_trait::async_trait;
    use serde_json::json;

    /// 固定返回一条结果的桩工具
    struct StubTool {
        output: Value,
    }

    #[async_trait]
    impl Tool for StubTool {
        fn name(&self) -> &str {
            "webSearch"
        }
        fn description(&self) -> &str {
            "stub"
        }
        fn parameters_schema(&self) -> Value {
            json!({"type": "object"})
        }
        async fn execute(&self, _args: Value) -> Result<Value, String> {
            Ok(self.output.clone())
        }
    }

    fn tool_call(n: u32) -> ToolCallRequest {
        ToolCallRequest {
            id: format!("call_{n}"),
            name: "webSearch".to_string(),
            arguments: json!({"query": "q"}),
        }
    }

    #[test]
    fn test_normalize_unwraps_wrapped_form_only() {
        assert_eq!(
            normalize_tool_result(json!({"result": {"a": 1}})),
            json!({"a": 1})
        );
        assert_eq!(
            normalize_tool_result(json!({"results": [1, 2]})),
            json!({"results": [1, 2]})
        );
        assert_eq!(normalize_tool_result(json!([1, 2])), json!([1, 2]));
    }

    #[test]
    fn test_synthesis_prompt_blocks() {
        let evidence = Evidence {
            raw_block: "[{\"title\": \"T\"}]".to_string(),
            summary: "summary".to_string(),
        };
        let prompt = build_synthesis_prompt(&evidence, "the query", Some("z.object({})"));
        assert!(prompt.contains("Raw Search Data:\n[{\"title\": \"T\"}]"));
        assert!(prompt.contains("LLM Summary:\nsummary"));
        assert!(prompt.contains("User Query:\nthe query"));
        assert!(prompt.contains("Desired Structure:\nz.object({})"));

        let prompt = build_synthesis_prompt(&evidence, "q", None);
        assert!(!prompt.contains("Desired Structure"));
    }

    #[tokio::test]
    async fn test_evidence_budget_is_exactly_five() {
        // 模型永远想再调一次工具：取证阶段必须在 5 步后停下
        let client = ScriptedLlmClient::new(vec![])
            .with_fallback(StepOutcome::tool_call(tool_call(0)))
            .with_objects(vec![json!({"done": true})]);
        let tool = Arc::new(StubTool {
            output: json!({"results": []}),
        });

        let object = run_pipeline(
            &client,
            tool,
            "m",
            &[IncomingMessage::user_text("q")],
            None,
            None,
            false,
        )
        .await
        .unwrap();
        assert_eq!(object, json!({"done": true}));

        // 5 步取证 + 1 次结构化
        assert_eq!(client.seen_requests().len(), MAX_EVIDENCE_STEPS + 1);
    }

    #[tokio::test]
    async fn test_phase_two_prompt_carries_raw_json_and_summary() {
        let client = ScriptedLlmClient::new(vec![
            StepOutcome {
                text: String::new(),
                tool_calls: vec![tool_call(1)],
            },
            StepOutcome::text("summary"),
        ])
        .with_objects(vec![json!({"anything": 1})]);
        let tool = Arc::new(StubTool {
            output: json!({"result": [{"title": "T", "url": "u", "content": "c"}]}),
        });

        run_pipeline(
            &client,
            tool,
            "m",
            &[IncomingMessage::user_text("X")],
            None,
            None,
            false,
        )
        .await
        .unwrap();

        let seen = client.seen_requests();
        let synthesis = seen.last().unwrap();
        assert!(synthesis.tool.is_none());
        let ChatMessage::User(prompt) = &synthesis.messages[1] else {
            panic!("expected user prompt");
        };
        // {result: T} 已解包：原始块是裸数组的 pretty JSON
        assert!(prompt.contains("\"title\": \"T\""));
        assert!(prompt.contains("LLM Summary:\nsummary"));
        assert!(prompt.contains("User Query:\nX"));
    }

    #[tokio::test]
    async fn test_raw_block_falls_back_to_summary_then_sentinel() {
        // 无工具调用、有自述 -> 原始块为自述
        let client = ScriptedLlmClient::new(vec![StepOutcome::text("only a summary")])
            .with_objects(vec![json!({})]);
        let tool = Arc::new(StubTool {
            output: json!({"results": []}),
        });
        run_pipeline(
            &client,
            tool.clone(),
            "m",
            &[IncomingMessage::user_text("q")],
            None,
            None,
            false,
        )
        .await
        .unwrap();
        let seen = client.seen_requests();
        let ChatMessage::User(prompt) = &seen.last().unwrap().messages[1] else {
            panic!("expected user prompt");
        };
        assert!(prompt.contains("Raw Search Data:\nonly a summary"));

        // 既无结果也无自述 -> 哨兵文本
        let client =
            ScriptedLlmClient::new(vec![StepOutcome::default()]).with_objects(vec![json!({})]);
        run_pipeline(
            &client,
            tool,
            "m",
            &[IncomingMessage::user_text("q")],
            None,
            None,
            false,
        )
        .await
        .unwrap();
        let seen = client.seen_requests();
        let ChatMessage::User(prompt) = &seen.last().unwrap().messages[1] else {
            panic!("expected user prompt");
        };
        assert!(prompt.contains("Raw Search Data:\nno results available"));
    }

    #[tokio::test]
    async fn test_schema_field_names_mandated_in_instruction() {
        let client = ScriptedLlmClient::new(vec![StepOutcome::text("s")])
            .with_objects(vec![json!({"answer": "a", "sources": []})]);
        let tool = Arc::new(StubTool {
            output: json!({"results": []}),
        });
        run_pipeline(
            &client,
            tool,
            "m",
            &[IncomingMessage::user_text("q")],
            Some("z.object({ answer: z.string(), sources: z.array(z.string()) })"),
            None,
            false,
        )
        .await
        .unwrap();

        let seen = client.seen_requests();
        let ChatMessage::System(instruction) = &seen.last().unwrap().messages[0] else {
            panic!("expected system instruction");
        };
        assert!(instruction.contains("answer, sources"));
        assert!(instruction.contains("preserved verbatim"));
    }

    #[tokio::test]
    async fn test_malformed_schema_degrades_and_still_returns_object() {
        let client = ScriptedLlmClient::new(vec![StepOutcome::text("s")])
            .with_objects(vec![json!({"freeform": true})]);
        let tool = Arc::new(StubTool {
            output: json!({"results": []}),
        });
        let object = run_pipeline(
            &client,
            tool,
            "m",
            &[IncomingMessage::user_text("q")],
            Some("const x = require('fs')"),
            None,
            false,
        )
        .await
        .unwrap();
        assert_eq!(object, json!({"freeform": true}));
    }

    #[tokio::test]
    async fn test_streaming_submode_returns_final_snapshot_only() {
        let client = ScriptedLlmClient::new(vec![StepOutcome::text("s")])
            .with_objects(vec![json!({"answer": "42"})]);
        let tool = Arc::new(StubTool {
            output: json!({"results": []}),
        });
        let object = run_pipeline(
            &client,
            tool,
            "m",
            &[IncomingMessage::user_text("q")],
            None,
            None,
            true,
        )
        .await
        .unwrap();
        assert_eq!(object, json!({"answer": "42"}));
    }
}
