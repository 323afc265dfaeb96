//! 工具注册表：封闭的工具 id 集合与按请求构建
//!
//! 八个检索工具共用同一个 HTTP 检索后端，只是 search_type 不同。
//! companyResearch 是唯一不受结果数上限约束的工具（研究类查询需要完整上下文）。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::SearchSection;
use crate::error::PlaygroundError;
use crate::tools::search::ProviderSearchTool;

/// 工具 trait：名称、描述、参数 schema 与执行
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// 参数的 JSON Schema（暴露给模型）
    fn parameters_schema(&self) -> Value;
    /// 执行工具；错误以字符串返回，由调用方决定如何呈现
    async fn execute(&self, args: Value) -> Result<Value, String>;
}

/// 封闭的工具 id 集合
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolId {
    WebSearch,
    FinanceSearch,
    PaperSearch,
    BioSearch,
    PatentSearch,
    SecSearch,
    EconomicsSearch,
    CompanyResearch,
}

impl ToolId {
    pub const ALL: [ToolId; 8] = [
        ToolId::WebSearch,
        ToolId::FinanceSearch,
        ToolId::PaperSearch,
        ToolId::BioSearch,
        ToolId::PatentSearch,
        ToolId::SecSearch,
        ToolId::EconomicsSearch,
        ToolId::CompanyResearch,
    ];

    /// 解析请求中的工具 id；未知 id 是客户端错误
    pub fn parse(s: &str) -> Result<Self, PlaygroundError> {
        match s {
            "webSearch" => Ok(Self::WebSearch),
            "financeSearch" => Ok(Self::FinanceSearch),
            "paperSearch" => Ok(Self::PaperSearch),
            "bioSearch" => Ok(Self::BioSearch),
            "patentSearch" => Ok(Self::PatentSearch),
            "secSearch" => Ok(Self::SecSearch),
            "economicsSearch" => Ok(Self::EconomicsSearch),
            "companyResearch" => Ok(Self::CompanyResearch),
            other => Err(PlaygroundError::InvalidTool(other.to_string())),
        }
    }

    /// 请求/事件中使用的名称
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::WebSearch => "webSearch",
            Self::FinanceSearch => "financeSearch",
            Self::PaperSearch => "paperSearch",
            Self::BioSearch => "bioSearch",
            Self::PatentSearch => "patentSearch",
            Self::SecSearch => "secSearch",
            Self::EconomicsSearch => "economicsSearch",
            Self::CompanyResearch => "companyResearch",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::WebSearch => "Web Search",
            Self::FinanceSearch => "Finance Search",
            Self::PaperSearch => "Paper Search",
            Self::BioSearch => "Bio Search",
            Self::PatentSearch => "Patent Search",
            Self::SecSearch => "SEC Search",
            Self::EconomicsSearch => "Economics Search",
            Self::CompanyResearch => "Company Research",
        }
    }

    /// 检索后端的类目键
    pub fn search_type(&self) -> &'static str {
        match self {
            Self::WebSearch => "web",
            Self::FinanceSearch => "finance",
            Self::PaperSearch => "paper",
            Self::BioSearch => "biomed",
            Self::PatentSearch => "patent",
            Self::SecSearch => "sec",
            Self::EconomicsSearch => "economics",
            Self::CompanyResearch => "company",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::WebSearch => "Search the web for current information on any topic",
            Self::FinanceSearch => "Search stock prices, market data and financial metrics",
            Self::PaperSearch => "Search academic papers and research publications",
            Self::BioSearch => "Search clinical trials, drug information and medical research",
            Self::PatentSearch => "Search patent filings, claims and IP records",
            Self::SecSearch => "Search SEC filings, financial statements and disclosures",
            Self::EconomicsSearch => "Search economic indicators, statistics and trends",
            Self::CompanyResearch => "Research a company in depth: profile, products, financials",
        }
    }

    /// 是否受 max_num_results 约束（companyResearch 不受）
    pub fn is_bounded(&self) -> bool {
        !matches!(self, Self::CompanyResearch)
    }
}

/// 按请求构建工具实例；结果数上限来自本次请求，不缓存
pub fn build_tool(
    id: ToolId,
    max_num_results: u32,
    search: &SearchSection,
    client: reqwest::Client,
) -> Arc<dyn Tool> {
    let bound = id.is_bounded().then_some(max_num_results);
    Arc::new(ProviderSearchTool::new(id, bound, search, client))
}
