//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Scripted Mock）实现 LlmClient：step（单步补全，
//! 可携带一个工具）、step_stream（流式单步）、complete_object（结构化生成）
//! 与 complete_object_stream（流式结构化，由调用方聚合最终快照）。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde_json::Value;
use thiserror::Error;

/// 装箱的 Send 流
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// LLM 调用错误
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Malformed structured output: {0}")]
    BadObject(String),
}

/// 对话消息（含工具调用往返）
#[derive(Clone, Debug)]
pub enum ChatMessage {
    System(String),
    User(String),
    /// 助手输出：文本与（可能的）工具调用请求
    Assistant {
        text: String,
        tool_calls: Vec<ToolCallRequest>,
    },
    /// 工具执行结果，回填给下一步
    ToolResult {
        call_id: String,
        content: String,
    },
}

/// 模型发起的一次工具调用请求
#[derive(Clone, Debug)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// 暴露给模型的工具声明（名称 + 描述 + 参数 JSON Schema）
#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 单步调用请求：模型、消息历史、至多一个工具
#[derive(Clone, Debug)]
pub struct StepRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tool: Option<ToolSpec>,
}

impl StepRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tool: None,
        }
    }

    pub fn with_tool(mut self, tool: ToolSpec) -> Self {
        self.tool = Some(tool);
        self
    }
}

/// 单步结果：文本与（可能为空的）工具调用请求列表
#[derive(Clone, Debug, Default)]
pub struct StepOutcome {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl StepOutcome {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn tool_call(call: ToolCallRequest) -> Self {
        Self {
            text: String::new(),
            tool_calls: vec![call],
        }
    }
}

/// 流式单步的增量：文本增量，或（流尾聚合完成的）工具调用
#[derive(Clone, Debug)]
pub enum StepDelta {
    Text(String),
    ToolCall(ToolCallRequest),
}

/// 结构化生成的约束：None 表示 schemaless（尽力而为的 JSON 模式）
#[derive(Clone, Debug)]
pub struct ObjectSpec {
    pub name: String,
    pub schema: Option<Value>,
}

impl ObjectSpec {
    pub fn schemaless() -> Self {
        Self {
            name: "structured_output".to_string(),
            schema: None,
        }
    }

    pub fn with_schema(schema: Value) -> Self {
        Self {
            name: "structured_output".to_string(),
            schema: Some(schema),
        }
    }
}

/// LLM 客户端 trait：单步补全（可带工具）与结构化生成，各有流式变体
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式单步：返回文本或工具调用请求
    async fn step(&self, req: &StepRequest) -> Result<StepOutcome, LlmError>;

    /// 流式单步：文本增量逐段产出，工具调用在流尾聚合后产出
    async fn step_stream(
        &self,
        req: &StepRequest,
    ) -> Result<BoxStream<Result<StepDelta, LlmError>>, LlmError>;

    /// 结构化生成：按 ObjectSpec 约束返回 JSON 值（schema 为 None 时尽力而为）
    async fn complete_object(
        &self,
        req: &StepRequest,
        spec: &ObjectSpec,
    ) -> Result<Value, LlmError>;

    /// 流式结构化生成：产出原始 JSON 文本增量；调用方负责排空并解析最终快照
    async fn complete_object_stream(
        &self,
        req: &StepRequest,
        spec: &ObjectSpec,
    ) -> Result<BoxStream<Result<String, LlmError>>, LlmError>;
}
