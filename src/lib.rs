//! Magpie - 工具增强生成试验场的编排服务
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **citations**: 从工具结果提取有序编号的引用
//! - **error**: 错误类型与 HTTP 状态映射
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Scripted Mock）
//! - **message**: 请求消息与渲染消息部件
//! - **orchestrator**: 模式分发、会话式生成与检索-结构化管线
//! - **schema**: schema 描述解析（声明式，不执行调用方文本）与生成助手
//! - **tools**: 检索工具注册表、HTTP 后端与静态目录

pub mod citations;
pub mod config;
pub mod error;
pub mod llm;
pub mod message;
pub mod observability;
pub mod orchestrator;
pub mod schema;
pub mod tools;

pub use error::PlaygroundError;
