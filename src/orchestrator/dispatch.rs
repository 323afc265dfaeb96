//! 模式分发：请求校验与策略路由
//!
//! 模式与工具 id 都是封闭集合：任一不合法即客户端错误，绝不发起模型调用
//! （模型调用计费，校验必须在前）。历史别名 "streaming" 在边界归一化为 stream。

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::SearchSection;
use crate::error::PlaygroundError;
use crate::llm::LlmClient;
use crate::message::IncomingMessage;
use crate::orchestrator::events::StreamEvent;
use crate::orchestrator::generate::{run_generate, run_stream};
use crate::orchestrator::pipeline::run_pipeline;
use crate::tools::{build_tool, ToolId};

/// 生成模式（封闭集合）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Stream,
    Generate,
    StreamObject,
    Object,
}

impl Mode {
    /// 解析模式字符串；"streaming" 是早期接口的别名，归一化为 Stream
    pub fn parse(s: &str) -> Result<Self, PlaygroundError> {
        match s {
            "stream" | "streaming" => Ok(Self::Stream),
            "generate" => Ok(Self::Generate),
            "stream-object" => Ok(Self::StreamObject),
            "object" => Ok(Self::Object),
            other => Err(PlaygroundError::InvalidMode(other.to_string())),
        }
    }
}

fn default_max_num_results() -> u32 {
    3
}

/// 编排端点的请求体
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub messages: Vec<IncomingMessage>,
    pub tool: String,
    pub model: String,
    #[serde(rename = "maxNumResults", default = "default_max_num_results")]
    pub max_num_results: u32,
    pub mode: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(rename = "schemaPrompt", default)]
    pub schema_prompt: Option<String>,
}

/// 分发结果：事件流 / 最终文本 / 最终对象
#[derive(Debug)]
pub enum DispatchOutcome {
    Stream(mpsc::UnboundedReceiver<StreamEvent>),
    Text(String),
    Object(Value),
}

/// 编排器：持有 LLM 客户端、检索配置与复用的 HTTP 连接池
pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    search: SearchSection,
    http: reqwest::Client,
}

impl Orchestrator {
    pub fn new(llm: Arc<dyn LlmClient>, search: SearchSection) -> Self {
        Self {
            llm,
            search,
            http: reqwest::Client::new(),
        }
    }

    /// 校验 -> 构建工具 -> 路由到策略
    pub async fn dispatch(
        &self,
        req: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<DispatchOutcome, PlaygroundError> {
        let mode = Mode::parse(&req.mode)?;
        let tool_id = ToolId::parse(&req.tool)?;
        // 每次请求新建实例，结果数上限即时生效
        let tool = build_tool(tool_id, req.max_num_results, &self.search, self.http.clone());

        info!(
            tool = tool_id.wire_name(),
            model = %req.model,
            mode = ?mode,
            max_num_results = req.max_num_results,
            "dispatching request"
        );

        match mode {
            Mode::Stream => Ok(DispatchOutcome::Stream(run_stream(
                self.llm.clone(),
                tool,
                req.model,
                req.messages,
                cancel,
            ))),
            Mode::Generate => {
                let text =
                    run_generate(self.llm.as_ref(), tool, &req.model, &req.messages).await?;
                Ok(DispatchOutcome::Text(text))
            }
            Mode::StreamObject | Mode::Object => {
                let object = run_pipeline(
                    self.llm.as_ref(),
                    tool,
                    &req.model,
                    &req.messages,
                    req.schema.as_deref(),
                    req.schema_prompt.as_deref(),
                    mode == Mode::StreamObject,
                )
                .await?;
                Ok(DispatchOutcome::Object(object))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlmClient;

    fn orchestrator() -> (Arc<ScriptedLlmClient>, Orchestrator) {
        let llm = Arc::new(ScriptedLlmClient::new(vec![]));
        let search = SearchSection {
            endpoint: "https://search.invalid".to_string(),
            api_key_env: "UNSET".to_string(),
            timeout_secs: 1,
            max_content_chars: 100,
        };
        (llm.clone(), Orchestrator::new(llm, search))
    }

    fn request(tool: &str, mode: &str) -> ChatRequest {
        ChatRequest {
            messages: vec![],
            tool: tool.to_string(),
            model: "m".to_string(),
            max_num_results: 3,
            mode: mode.to_string(),
            schema: None,
            schema_prompt: None,
        }
    }

    #[test]
    fn test_mode_parse_with_historical_alias() {
        assert_eq!(Mode::parse("stream").unwrap(), Mode::Stream);
        assert_eq!(Mode::parse("streaming").unwrap(), Mode::Stream);
        assert_eq!(Mode::parse("generate").unwrap(), Mode::Generate);
        assert_eq!(Mode::parse("stream-object").unwrap(), Mode::StreamObject);
        assert_eq!(Mode::parse("object").unwrap(), Mode::Object);
        assert!(matches!(
            Mode::parse("Stream"),
            Err(PlaygroundError::InvalidMode(_))
        ));
    }

    #[test]
    fn test_request_defaults() {
        let req: ChatRequest = serde_json::from_str(
            r#"{"tool": "webSearch", "model": "m", "mode": "generate"}"#,
        )
        .unwrap();
        assert_eq!(req.max_num_results, 3);
        assert!(req.messages.is_empty());
        assert!(req.schema.is_none());
    }

    #[tokio::test]
    async fn test_invalid_mode_rejected_before_any_model_call() {
        let (llm, orchestrator) = orchestrator();
        let err = orchestrator
            .dispatch(request("webSearch", "banana"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PlaygroundError::InvalidMode(_)));
        assert!(err.is_client_error());
        assert!(llm.seen_requests().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_tool_rejected_before_any_model_call() {
        let (llm, orchestrator) = orchestrator();
        let err = orchestrator
            .dispatch(request("shellExec", "generate"), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PlaygroundError::InvalidTool(_)));
        assert!(err.is_client_error());
        assert!(llm.seen_requests().is_empty());
    }
}
