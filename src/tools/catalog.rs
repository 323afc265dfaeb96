//! 工具与模型目录（供前端选择器使用的静态数据）

use serde::Serialize;

use crate::tools::registry::ToolId;

/// 目录条目：id、展示名、示例提示词与该工具的默认 schema 文本
#[derive(Clone, Debug, Serialize)]
pub struct CatalogEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub sample_prompt: &'static str,
    pub default_schema: &'static str,
}

/// 模型条目：按提供方分组展示
#[derive(Clone, Debug, Serialize)]
pub struct ModelEntry {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'static str>,
}

pub fn sample_prompt(id: ToolId) -> &'static str {
    match id {
        ToolId::WebSearch => "Latest data center projects for AI inference workloads?",
        ToolId::FinanceSearch => {
            "What was the stock price of Apple from the beginning of 2020 to 14th feb?"
        }
        ToolId::PaperSearch => "Psilocybin effects on cellular lifespan and longevity in mice?",
        ToolId::BioSearch => {
            "Summarise top completed Phase 3 metastatic melanoma trial comparing nivolumab+ipilimumab vs monotherapy"
        }
        ToolId::PatentSearch => {
            "Find patents published in 2025 for high energy laser weapon systems"
        }
        ToolId::SecSearch => "Summarise MD&A section of Tesla's latest 10-k filling",
        ToolId::EconomicsSearch => "What is CPI vs unemployment since 2020 in the US?",
        ToolId::CompanyResearch => "Research the company Holistic AI",
    }
}

/// 每个工具的默认 schema 文本（与解析器支持的记法一致）
pub fn default_schema(id: ToolId) -> &'static str {
    match id {
        ToolId::WebSearch => {
            r#"z.object({
  query: z.string().describe("The search query"),
  summary: z.string().describe("Executive summary of findings"),
  results: z.array(z.object({
    title: z.string(),
    source: z.string().describe("Website or publication name"),
    url: z.string().optional(),
    keyPoints: z.array(z.string()),
    relevance: z.enum(["high", "medium", "low"]),
  })),
  conclusion: z.string(),
})"#
        }
        ToolId::FinanceSearch => {
            r#"z.object({
  query: z.string(),
  securities: z.array(z.object({
    ticker: z.string(),
    name: z.string(),
    prices: z.array(z.object({
      date: z.string(),
      open: z.number().optional(),
      close: z.number().optional(),
    })),
  })),
  analysis: z.string(),
  dataSource: z.string(),
})"#
        }
        ToolId::PaperSearch => {
            r#"z.object({
  query: z.string(),
  papers: z.array(z.object({
    title: z.string(),
    authors: z.array(z.string()),
    year: z.number().optional(),
    abstract: z.string(),
    keyFindings: z.array(z.string()),
  })),
  synthesis: z.string().describe("Overall synthesis of the research"),
  gaps: z.array(z.string()).describe("Research gaps identified"),
})"#
        }
        ToolId::BioSearch => {
            r#"z.object({
  query: z.string(),
  trials: z.array(z.object({
    trialId: z.string().describe("NCT number or trial identifier"),
    title: z.string(),
    phase: z.string().optional(),
    status: z.string(),
    condition: z.string(),
    intervention: z.string(),
    results: z.string().optional(),
  })),
  summary: z.string(),
})"#
        }
        ToolId::PatentSearch => {
            r#"z.object({
  query: z.string(),
  patents: z.array(z.object({
    patentNumber: z.string(),
    title: z.string(),
    assignee: z.string(),
    filingDate: z.string(),
    abstract: z.string(),
    claims: z.array(z.string()).describe("Key patent claims"),
  })),
  landscape: z.string().describe("Patent landscape analysis"),
})"#
        }
        ToolId::SecSearch => {
            r#"z.object({
  query: z.string(),
  filings: z.array(z.object({
    formType: z.string().describe("10-K, 10-Q, 8-K, etc."),
    company: z.string(),
    filingDate: z.string(),
    sections: z.array(z.object({
      name: z.string().describe("Section name like MD&A, Risk Factors"),
      summary: z.string(),
      keyPoints: z.array(z.string()),
    })),
  })),
  analysis: z.string(),
})"#
        }
        ToolId::EconomicsSearch => {
            r#"z.object({
  query: z.string(),
  indicators: z.array(z.object({
    name: z.string().describe("CPI, GDP, Unemployment Rate, etc."),
    values: z.array(z.object({
      date: z.string(),
      value: z.number(),
    })),
    source: z.string(),
    trend: z.enum(["increasing", "decreasing", "stable"]).optional(),
  })),
  analysis: z.string(),
})"#
        }
        ToolId::CompanyResearch => {
            r#"z.object({
  company: z.object({
    name: z.string(),
    ticker: z.string().optional(),
    industry: z.string(),
    headquarters: z.string().optional(),
  }),
  description: z.string(),
  products: z.array(z.string()),
  competitors: z.array(z.string()).optional(),
})"#
        }
    }
}

/// 全量工具目录
pub fn tool_catalog() -> Vec<CatalogEntry> {
    ToolId::ALL
        .iter()
        .map(|&id| CatalogEntry {
            id: id.wire_name(),
            name: id.display_name(),
            sample_prompt: sample_prompt(id),
            default_schema: default_schema(id),
        })
        .collect()
}

/// 可选模型列表（低延迟网关模型带注记）
pub fn model_catalog() -> Vec<ModelEntry> {
    vec![
        ModelEntry {
            id: "google/gemini-3-pro-preview",
            name: "Gemini 3 Pro",
            provider: "google",
            note: None,
        },
        ModelEntry {
            id: "openai/gpt-5.1-instant",
            name: "GPT-5.1 Instant",
            provider: "openai",
            note: None,
        },
        ModelEntry {
            id: "openai/gpt-oss-120b",
            name: "GPT OSS 120B",
            provider: "openai",
            note: Some("via gateway"),
        },
        ModelEntry {
            id: "anthropic/claude-opus-4.5",
            name: "Claude Opus 4.5",
            provider: "anthropic",
            note: None,
        },
        ModelEntry {
            id: "xai/grok-4",
            name: "Grok 4",
            provider: "xai",
            note: None,
        },
        ModelEntry {
            id: "amazon/nova-pro",
            name: "Nova Pro",
            provider: "amazon",
            note: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;

    #[test]
    fn test_catalog_covers_every_tool() {
        let catalog = tool_catalog();
        assert_eq!(catalog.len(), ToolId::ALL.len());
        assert!(catalog.iter().any(|e| e.id == "companyResearch"));
    }

    #[test]
    fn test_every_default_schema_parses() {
        for id in ToolId::ALL {
            let text = default_schema(id);
            assert!(
                parse_schema(text).is_ok(),
                "default schema for {} should parse",
                id.wire_name()
            );
        }
    }
}
