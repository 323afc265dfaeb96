//! Playground 错误类型
//!
//! 客户端输入错误（未知工具 / 未知模式 / 缺字段）在进入任何模型调用前同步返回；
//! 上游调用错误在各策略最外层统一捕获，记录日志后以通用失败载荷返回。

use thiserror::Error;

use crate::llm::LlmError;

/// 编排过程中可能出现的错误（输入校验、上游调用、结构化输出解析）
#[derive(Error, Debug)]
pub enum PlaygroundError {
    #[error("Invalid tool: {0}")]
    InvalidTool(String),

    #[error("Invalid mode: {0}")]
    InvalidMode(String),

    #[error("Prompt is required")]
    MissingPrompt,

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// 结构化输出无法解析为 JSON（流式结构化路径聚合后解析失败）
    #[error("Malformed structured output: {0}")]
    MalformedOutput(String),
}

impl PlaygroundError {
    /// 是否为客户端输入错误（对应 4xx；其余为 5xx）
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PlaygroundError::InvalidTool(_)
                | PlaygroundError::InvalidMode(_)
                | PlaygroundError::MissingPrompt
        )
    }
}
