//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `MAGPIE__*` 覆盖（双下划线表示嵌套，如 `MAGPIE__SERVER__PORT=9090`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub search: SearchSection,
}

/// [server] 段：监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// [llm] 段：OpenAI 兼容端点、低延迟网关路由与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 默认 OpenAI 兼容端点；未设置时用客户端库默认
    pub base_url: Option<String>,
    /// 低延迟网关路径；gateway_models 中的模型强制走该端点
    pub gateway_base_url: Option<String>,
    /// 强制走低延迟网关的模型 id 列表
    #[serde(default = "default_gateway_models")]
    pub gateway_models: Vec<String>,
    /// Schema 起草助手固定使用的模型
    #[serde(default = "default_draft_model")]
    pub draft_model: String,
    /// 单次（非流式）调用的墙钟超时（秒）
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// 流式调用建立连接的墙钟超时（秒）
    #[serde(default = "default_stream_timeout")]
    pub stream_timeout_secs: u64,
}

fn default_gateway_models() -> Vec<String> {
    vec!["openai/gpt-oss-120b".to_string()]
}

fn default_draft_model() -> String {
    "openai/gpt-oss-120b".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

fn default_stream_timeout() -> u64 {
    120
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: None,
            gateway_base_url: None,
            gateway_models: default_gateway_models(),
            draft_model: default_draft_model(),
            request_timeout_secs: default_request_timeout(),
            stream_timeout_secs: default_stream_timeout(),
        }
    }
}

/// [search] 段：检索服务端点、API Key 环境变量名、超时与结果截断
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    /// 存放 API Key 的环境变量名（构建工具时读取）
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
    /// 单条搜索结果 content 截断长度（字符）
    #[serde(default = "default_max_content_chars")]
    pub max_content_chars: usize,
}

fn default_search_endpoint() -> String {
    "https://api.valyu.network/v1/search".to_string()
}

fn default_api_key_env() -> String {
    "VALYU_API_KEY".to_string()
}

fn default_search_timeout_secs() -> u64 {
    15
}

fn default_max_content_chars() -> usize {
    2000
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_search_timeout_secs(),
            max_content_chars: default_max_content_chars(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSection::default(),
            llm: LlmSection::default(),
            search: SearchSection::default(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 MAGPIE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 MAGPIE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("MAGPIE")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.llm.draft_model, "openai/gpt-oss-120b");
        assert!(cfg
            .llm
            .gateway_models
            .contains(&"openai/gpt-oss-120b".to_string()));
        assert_eq!(cfg.search.max_content_chars, 2000);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("override.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "[server]\nport = 9091\n\n[search]\ntimeout_secs = 5").unwrap();

        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.server.port, 9091);
        assert_eq!(cfg.search.timeout_secs, 5);
        // 未覆盖的键保持默认
        assert_eq!(cfg.search.max_content_chars, 2000);
    }
}
