//! 会话式生成策略：带单工具的步进循环
//!
//! 系统提示词嵌入当天日期并要求行内 [n] 引用；每步至多一次工具往返，
//! 硬上限 MAX_TEXT_STEPS。步数耗尽返回已产出的文本，不视为错误。
//! 流式路径逐事件推送并以 citations + done 收尾；批式路径只返回最终文本。

use std::sync::Arc;

use chrono::Local;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::citations::extract_citations;
use crate::error::PlaygroundError;
use crate::llm::{ChatMessage, LlmClient, StepDelta, StepRequest, ToolCallRequest, ToolSpec};
use crate::message::{IncomingMessage, MessagePart, Role, ToolCallState};
use crate::orchestrator::events::StreamEvent;
use crate::tools::Tool;

/// 单次请求的最大模型步数
pub const MAX_TEXT_STEPS: usize = 10;

/// 系统提示词：日期按请求计算，引用紧跟陈述
pub fn system_prompt() -> String {
    let today = Local::now().format("%A, %B %-d, %Y");
    format!(
        "Today is {today}. Answer using search results. Place citations immediately after \
         each statement like \"fact [1]\" or \"claim [2][3]\", not grouped at the end. \
         Citation numbers correspond to search result order. Write in well formatted MD."
    )
}

/// 请求消息 -> LLM 消息（系统提示词在最前）
fn build_conversation(messages: &[IncomingMessage]) -> Vec<ChatMessage> {
    let mut out = vec![ChatMessage::System(system_prompt())];
    for msg in messages {
        let text = msg.joined_text();
        match msg.role {
            Role::User => out.push(ChatMessage::User(text)),
            Role::Assistant => out.push(ChatMessage::Assistant {
                text,
                tool_calls: Vec::new(),
            }),
            Role::System => out.push(ChatMessage::System(text)),
        }
    }
    out
}

fn tool_spec(tool: &dyn Tool) -> ToolSpec {
    ToolSpec {
        name: tool.name().to_string(),
        description: tool.description().to_string(),
        parameters: tool.parameters_schema(),
    }
}

/// 执行一次工具调用，把结果（或错误文本）回填为 ToolResult 消息
async fn run_tool_call(
    tool: &dyn Tool,
    call: &ToolCallRequest,
) -> (ChatMessage, Result<serde_json::Value, String>) {
    let result = if call.name == tool.name() {
        tool.execute(call.arguments.clone()).await
    } else {
        Err(format!("unknown tool: {}", call.name))
    };
    let content = match &result {
        Ok(output) => output.to_string(),
        Err(e) => format!("Tool execution failed: {e}"),
    };
    (
        ChatMessage::ToolResult {
            call_id: call.id.clone(),
            content,
        },
        result,
    )
}

/// 批式生成：步进到模型停止调工具，或步数耗尽；返回最后产出的文本
pub async fn run_generate(
    llm: &dyn LlmClient,
    tool: Arc<dyn Tool>,
    model: &str,
    messages: &[IncomingMessage],
) -> Result<String, PlaygroundError> {
    let mut conversation = build_conversation(messages);
    let spec = tool_spec(tool.as_ref());
    let mut text = String::new();

    for step in 0..MAX_TEXT_STEPS {
        let req = StepRequest::new(model, conversation.clone()).with_tool(spec.clone());
        let outcome = llm.step(&req).await?;
        if !outcome.text.is_empty() {
            text = outcome.text.clone();
        }

        if outcome.tool_calls.is_empty() {
            debug!(step, "generation settled");
            return Ok(text);
        }

        conversation.push(ChatMessage::Assistant {
            text: outcome.text.clone(),
            tool_calls: outcome.tool_calls.clone(),
        });
        for call in &outcome.tool_calls {
            let (result_msg, _) = run_tool_call(tool.as_ref(), call).await;
            conversation.push(result_msg);
        }
    }

    // 步数耗尽：返回目前为止的文本
    info!(steps = MAX_TEXT_STEPS, "step budget exhausted");
    Ok(text)
}

/// 流式生成：事件推入通道，调用方负责编码为 NDJSON。
/// 连接断开时取消令牌触发，循环尽快退出。
pub fn run_stream(
    llm: Arc<dyn LlmClient>,
    tool: Arc<dyn Tool>,
    model: String,
    messages: Vec<IncomingMessage>,
    cancel: CancellationToken,
) -> mpsc::UnboundedReceiver<StreamEvent> {
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut conversation = build_conversation(&messages);
        let spec = tool_spec(tool.as_ref());
        // 工具部件的有序记录，收尾时用于引用提取
        let mut parts: Vec<MessagePart> = Vec::new();

        for _step in 0..MAX_TEXT_STEPS {
            if cancel.is_cancelled() {
                return;
            }

            let req = StepRequest::new(&model, conversation.clone()).with_tool(spec.clone());
            let stream = tokio::select! {
                _ = cancel.cancelled() => return,
                result = llm.step_stream(&req) => result,
            };
            let mut stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!(error = %e, "llm step failed");
                    let _ = tx.send(StreamEvent::Error {
                        error: e.to_string(),
                    });
                    return;
                }
            };

            let mut step_text = String::new();
            let mut tool_calls: Vec<ToolCallRequest> = Vec::new();
            loop {
                let delta = tokio::select! {
                    _ = cancel.cancelled() => return,
                    delta = stream.next() => delta,
                };
                match delta {
                    Some(Ok(StepDelta::Text(delta))) => {
                        step_text.push_str(&delta);
                        let _ = tx.send(StreamEvent::TextDelta { delta });
                    }
                    Some(Ok(StepDelta::ToolCall(call))) => tool_calls.push(call),
                    Some(Err(e)) => {
                        error!(error = %e, "llm stream failed");
                        let _ = tx.send(StreamEvent::Error {
                            error: e.to_string(),
                        });
                        return;
                    }
                    None => break,
                }
            }

            if tool_calls.is_empty() {
                let _ = tx.send(StreamEvent::Citations {
                    citations: extract_citations(&parts),
                });
                let _ = tx.send(StreamEvent::Done);
                return;
            }

            conversation.push(ChatMessage::Assistant {
                text: step_text,
                tool_calls: tool_calls.clone(),
            });
            for call in &tool_calls {
                let _ = tx.send(StreamEvent::ToolInputAvailable {
                    tool: call.name.clone(),
                    input: call.arguments.clone(),
                });
                let (result_msg, result) = run_tool_call(tool.as_ref(), call).await;
                match result {
                    Ok(output) => {
                        let _ = tx.send(StreamEvent::ToolOutputAvailable {
                            tool: call.name.clone(),
                            output: output.clone(),
                        });
                        parts.push(MessagePart::Tool {
                            tool: call.name.clone(),
                            state: ToolCallState::OutputAvailable,
                            input: call.arguments.clone(),
                            output: Some(output),
                            error: None,
                        });
                    }
                    Err(e) => {
                        let _ = tx.send(StreamEvent::ToolOutputError {
                            tool: call.name.clone(),
                            error: e.clone(),
                        });
                        parts.push(MessagePart::Tool {
                            tool: call.name.clone(),
                            state: ToolCallState::OutputError,
                            input: call.arguments.clone(),
                            output: None,
                            error: Some(e),
                        });
                    }
                }
                conversation.push(result_msg);
            }
        }

        // 步数耗尽：按正常路径收尾
        info!(steps = MAX_TEXT_STEPS, "step budget exhausted");
        let _ = tx.send(StreamEvent::Citations {
            citations: extract_citations(&parts),
        });
        let _ = tx.send(StreamEvent::Done);
    });

    rx
}
