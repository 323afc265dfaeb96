//! LLM 客户端层：trait 抽象、OpenAI 兼容实现与测试用 Mock

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::ScriptedLlmClient;
pub use openai::OpenAiClient;
pub use traits::{
    BoxStream, ChatMessage, LlmClient, LlmError, ObjectSpec, StepDelta, StepOutcome, StepRequest,
    ToolCallRequest, ToolSpec,
};
