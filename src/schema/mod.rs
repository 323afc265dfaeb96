//! Schema 层：描述文本解析与生成助手
//!
//! resolve_schema 是结构化生成路径的唯一入口：文本缺失或解析失败时
//! 降级为 schemaless（尽力而为的 JSON 模式），绝不让坏 schema 让请求失败。

pub mod assistant;
pub mod parser;

use serde_json::Value;
use tracing::warn;

use crate::llm::ObjectSpec;
pub use assistant::draft_schema;
pub use parser::{parse_schema, Annotated, Field, SchemaNode, SchemaParseError};

/// 解析结果：结构化约束，或降级后的 schemaless
#[derive(Clone, Debug)]
pub enum ResolvedSchema {
    /// 解析成功：保留字段名（供合成提示词点名）与 JSON Schema
    Parsed {
        field_names: Vec<String>,
        json_schema: Value,
        text: String,
    },
    Schemaless,
}

impl ResolvedSchema {
    /// 结构化生成约束
    pub fn object_spec(&self) -> ObjectSpec {
        match self {
            Self::Parsed { json_schema, .. } => ObjectSpec::with_schema(json_schema.clone()),
            Self::Schemaless => ObjectSpec::schemaless(),
        }
    }

    /// 顶层字段名（schemaless 为空）
    pub fn field_names(&self) -> &[String] {
        match self {
            Self::Parsed { field_names, .. } => field_names,
            Self::Schemaless => &[],
        }
    }

    /// 原始 schema 文本（供合成提示词展示期望结构）
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Parsed { text, .. } => Some(text),
            Self::Schemaless => None,
        }
    }
}

/// 解析 schema 描述文本；缺失、空白或无法解析时降级为 schemaless
pub fn resolve_schema(text: Option<&str>) -> ResolvedSchema {
    let Some(text) = text.map(str::trim).filter(|t| !t.is_empty()) else {
        return ResolvedSchema::Schemaless;
    };
    match parse_schema(text) {
        Ok(annotated) => ResolvedSchema::Parsed {
            field_names: annotated
                .top_level_field_names()
                .into_iter()
                .map(String::from)
                .collect(),
            json_schema: annotated.to_json_schema(),
            text: text.to_string(),
        },
        Err(e) => {
            warn!(error = %e, "schema parse failed, falling back to schemaless output");
            ResolvedSchema::Schemaless
        }
    }
}
