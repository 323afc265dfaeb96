//! 编排层：模式分发与两条生成策略

pub mod dispatch;
pub mod events;
pub mod generate;
pub mod pipeline;

pub use dispatch::{ChatRequest, DispatchOutcome, Mode, Orchestrator};
pub use events::StreamEvent;
pub use generate::{run_generate, run_stream, MAX_TEXT_STEPS};
pub use pipeline::{normalize_tool_result, run_pipeline, MAX_EVIDENCE_STEPS};
