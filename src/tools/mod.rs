//! 工具层：注册表、HTTP 检索后端与静态目录

pub mod catalog;
pub mod registry;
pub mod search;

pub use catalog::{model_catalog, tool_catalog, CatalogEntry, ModelEntry};
pub use registry::{build_tool, Tool, ToolId};
pub use search::ProviderSearchTool;
