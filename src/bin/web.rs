//! Magpie Web 服务：编排端点与 schema 生成端点
//!
//! POST /api/chat 按 mode 返回 NDJSON 事件流（stream）、{text}（generate）
//! 或 {object}（对象模式）；POST /api/generate-schema 返回 {schema}。
//! 错误统一为 {error} JSON：客户端输入错误 400，上游故障 500。

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use futures_util::stream;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use magpie::config::load_config;
use magpie::error::PlaygroundError;
use magpie::llm::{LlmClient, OpenAiClient};
use magpie::orchestrator::{ChatRequest, DispatchOutcome, Orchestrator};
use magpie::schema::draft_schema;
use magpie::tools::{model_catalog, tool_catalog};

struct AppState {
    orchestrator: Orchestrator,
    llm: Arc<dyn LlmClient>,
    draft_model: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    magpie::observability::init();

    let cfg = load_config(None).unwrap_or_default();
    let llm: Arc<dyn LlmClient> = Arc::new(OpenAiClient::new(&cfg.llm, None));
    let state = Arc::new(AppState {
        orchestrator: Orchestrator::new(llm.clone(), cfg.search.clone()),
        llm,
        draft_model: cfg.llm.draft_model.clone(),
    });

    let app = Router::new()
        .route("/api/chat", post(api_chat))
        .route("/api/generate-schema", post(api_generate_schema))
        .route("/api/tools", get(api_tools))
        .route("/api/models", get(api_models))
        .with_state(state);

    let addr = format!("{}:{}", cfg.server.host, cfg.server.port);
    tracing::info!("Magpie listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// PlaygroundError -> {error} JSON + 状态码
fn error_response(e: PlaygroundError) -> Response {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        tracing::error!(error = %e, "request failed");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}

/// POST /api/chat：校验 -> 分发 -> 按模式编码响应
async fn api_chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> Response {
    let cancel = CancellationToken::new();
    match state.orchestrator.dispatch(req, cancel.clone()).await {
        Ok(DispatchOutcome::Stream(rx)) => {
            // 客户端断开时响应体被丢弃，守卫随之触发取消
            let guard = cancel.drop_guard();
            let stream = stream::unfold((rx, guard), |(mut rx, guard)| async move {
                rx.recv().await.map(|ev| {
                    let line = format!("{}\n", serde_json::to_string(&ev).unwrap());
                    (Ok::<Bytes, Infallible>(Bytes::from(line)), (rx, guard))
                })
            });
            let mut res = Response::new(Body::from_stream(stream));
            res.headers_mut().insert(
                axum::http::header::CONTENT_TYPE,
                "application/x-ndjson; charset=utf-8".parse().unwrap(),
            );
            res
        }
        Ok(DispatchOutcome::Text(text)) => Json(json!({ "text": text })).into_response(),
        Ok(DispatchOutcome::Object(object)) => {
            Json(json!({ "object": object })).into_response()
        }
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct GenerateSchemaRequest {
    #[serde(default)]
    prompt: Option<String>,
}

/// POST /api/generate-schema：自然语言 -> schema 文本
async fn api_generate_schema(
    State(state): State<Arc<AppState>>,
    Json(req): Json<GenerateSchemaRequest>,
) -> Response {
    let Some(prompt) = req.prompt.filter(|p| !p.trim().is_empty()) else {
        return error_response(PlaygroundError::MissingPrompt);
    };
    match draft_schema(state.llm.as_ref(), &state.draft_model, &prompt).await {
        Ok(schema) => Json(json!({ "schema": schema })).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/tools：工具目录（示例提示词与默认 schema）
async fn api_tools(State(_state): State<Arc<AppState>>) -> Response {
    Json(json!({ "tools": tool_catalog() })).into_response()
}

/// GET /api/models：可选模型列表
async fn api_models(State(_state): State<Arc<AppState>>) -> Response {
    Json(json!({ "models": model_catalog() })).into_response()
}
