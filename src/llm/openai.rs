//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url），支持工具调用、
//! 流式增量与 JSON Schema 结构化输出。命中低延迟路由组（gateway_models）的模型
//! 强制走 gateway_base_url；其余模型走默认端点。每次调用施加墙钟超时。

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionTools,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, FunctionCall,
    FunctionObjectArgs, ResponseFormat, ResponseFormatJsonSchema,
};
use async_openai::Client;
use async_trait::async_trait;
use futures_util::{stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::config::LlmSection;
use crate::llm::{
    BoxStream, ChatMessage, LlmClient, LlmError, ObjectSpec, StepDelta, StepOutcome, StepRequest,
    ToolCallRequest,
};

/// OpenAI 兼容客户端：默认端点 + 可选低延迟网关端点
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    gateway_client: Option<Client<OpenAIConfig>>,
    gateway_models: HashSet<String>,
    request_timeout: Duration,
    stream_timeout: Duration,
}

impl OpenAiClient {
    pub fn new(cfg: &LlmSection, api_key: Option<&str>) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let base_config = match cfg.base_url {
            Some(ref url) => OpenAIConfig::new().with_api_base(url).with_api_key(&api_key),
            None => OpenAIConfig::new().with_api_key(&api_key),
        };
        let gateway_client = cfg.gateway_base_url.as_ref().map(|url| {
            Client::with_config(OpenAIConfig::new().with_api_base(url).with_api_key(&api_key))
        });

        Self {
            client: Client::with_config(base_config),
            gateway_client,
            gateway_models: cfg.gateway_models.iter().cloned().collect(),
            request_timeout: Duration::from_secs(cfg.request_timeout_secs),
            stream_timeout: Duration::from_secs(cfg.stream_timeout_secs),
        }
    }

    /// 按模型选择端点：低延迟路由组走网关，其余默认
    fn client_for(&self, model: &str) -> &Client<OpenAIConfig> {
        if self.gateway_models.contains(model) {
            if let Some(ref gw) = self.gateway_client {
                return gw;
            }
        }
        &self.client
    }

    fn to_openai_messages(messages: &[ChatMessage]) -> Vec<ChatCompletionRequestMessage> {
        messages
            .iter()
            .map(|m| match m {
                ChatMessage::System(content) => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(content.clone())
                        .build()
                        .unwrap(),
                ),
                ChatMessage::User(content) => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(content.clone())
                        .build()
                        .unwrap(),
                ),
                ChatMessage::Assistant { text, tool_calls } => {
                    let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                    if !text.is_empty() {
                        builder.content(text.clone());
                    }
                    if !tool_calls.is_empty() {
                        builder.tool_calls(
                            tool_calls
                                .iter()
                                .map(|c| {
                                    ChatCompletionMessageToolCalls::Function(
                                        ChatCompletionMessageToolCall {
                                            id: c.id.clone(),
                                            function: FunctionCall {
                                                name: c.name.clone(),
                                                arguments: c.arguments.to_string(),
                                            },
                                        },
                                    )
                                })
                                .collect::<Vec<_>>(),
                        );
                    }
                    ChatCompletionRequestMessage::Assistant(builder.build().unwrap())
                }
                ChatMessage::ToolResult { call_id, content } => ChatCompletionRequestMessage::Tool(
                    ChatCompletionRequestToolMessageArgs::default()
                        .content(content.clone())
                        .tool_call_id(call_id.clone())
                        .build()
                        .unwrap(),
                ),
            })
            .collect()
    }

    fn build_request(
        req: &StepRequest,
        response_format: Option<ResponseFormat>,
    ) -> Result<CreateChatCompletionRequest, LlmError> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&req.model)
            .messages(Self::to_openai_messages(&req.messages));

        if let Some(ref tool) = req.tool {
            let function = FunctionObjectArgs::default()
                .name(&tool.name)
                .description(&tool.description)
                .parameters(tool.parameters.clone())
                .build()
                .map_err(|e| LlmError::Api(e.to_string()))?;
            let tool = ChatCompletionTools::Function(ChatCompletionTool { function });
            builder.tools(vec![tool]);
        }

        if let Some(format) = response_format {
            builder.response_format(format);
        }

        builder.build().map_err(|e| LlmError::Api(e.to_string()))
    }

    fn object_response_format(spec: &ObjectSpec) -> ResponseFormat {
        match spec.schema {
            Some(ref schema) => ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: None,
                    name: spec.name.clone(),
                    schema: Some(schema.clone()),
                    strict: Some(true),
                },
            },
            // schemaless：尽力而为的 JSON 模式
            None => ResponseFormat::JsonObject,
        }
    }

    /// 发起一次非流式补全，取首个 choice
    async fn create_once(
        &self,
        req: &StepRequest,
        response_format: Option<ResponseFormat>,
    ) -> Result<StepOutcome, LlmError> {
        let request = Self::build_request(req, response_format)?;
        let response = timeout(
            self.request_timeout,
            self.client_for(&req.model).chat().create(request),
        )
        .await
        .map_err(|_| LlmError::Timeout(self.request_timeout.as_secs()))?
        .map_err(|e| LlmError::Api(e.to_string()))?;

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| LlmError::Api("empty choices".to_string()))?;

        let tool_calls = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|call| match call {
                ChatCompletionMessageToolCalls::Function(call) => Some(ToolCallRequest {
                    id: call.id,
                    name: call.function.name,
                    arguments: serde_json::from_str(&call.function.arguments)
                        .unwrap_or_else(|_| serde_json::json!({})),
                }),
                ChatCompletionMessageToolCalls::Custom(_) => None,
            })
            .collect();

        Ok(StepOutcome {
            text: message.content.unwrap_or_default(),
            tool_calls,
        })
    }

    /// 建立一个流式补全，将增量透传到 mpsc 通道；工具调用分片在流尾聚合
    async fn create_stream_channel(
        &self,
        req: &StepRequest,
        response_format: Option<ResponseFormat>,
    ) -> Result<mpsc::UnboundedReceiver<Result<StepDelta, LlmError>>, LlmError> {
        let request = Self::build_request(req, response_format)?;
        let mut inner = timeout(
            self.stream_timeout,
            self.client_for(&req.model).chat().create_stream(request),
        )
        .await
        .map_err(|_| LlmError::Timeout(self.stream_timeout.as_secs()))?
        .map_err(|e| LlmError::Api(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            #[derive(Default)]
            struct PendingCall {
                id: String,
                name: String,
                arguments: String,
            }
            let mut pending: BTreeMap<u32, PendingCall> = BTreeMap::new();

            while let Some(item) = inner.next().await {
                let chunk = match item {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(LlmError::Stream(e.to_string())));
                        return;
                    }
                };
                for choice in &chunk.choices {
                    if let Some(ref content) = choice.delta.content {
                        if !content.is_empty() {
                            let _ = tx.send(Ok(StepDelta::Text(content.clone())));
                        }
                    }
                    if let Some(ref calls) = choice.delta.tool_calls {
                        for call in calls {
                            let slot = pending.entry(call.index as u32).or_default();
                            if let Some(ref id) = call.id {
                                slot.id = id.clone();
                            }
                            if let Some(ref function) = call.function {
                                if let Some(ref name) = function.name {
                                    slot.name.push_str(name);
                                }
                                if let Some(ref arguments) = function.arguments {
                                    slot.arguments.push_str(arguments);
                                }
                            }
                        }
                    }
                }
            }

            for (_, call) in pending {
                let arguments = serde_json::from_str(&call.arguments)
                    .unwrap_or_else(|_| serde_json::json!({}));
                let _ = tx.send(Ok(StepDelta::ToolCall(ToolCallRequest {
                    id: call.id,
                    name: call.name,
                    arguments,
                })));
            }
        });

        Ok(rx)
    }
}

/// 将 mpsc 接收端包装为 Stream
fn receiver_stream<T: Send + 'static>(rx: mpsc::UnboundedReceiver<T>) -> BoxStream<T> {
    Box::pin(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|item| (item, rx))
    }))
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn step(&self, req: &StepRequest) -> Result<StepOutcome, LlmError> {
        self.create_once(req, None).await
    }

    async fn step_stream(
        &self,
        req: &StepRequest,
    ) -> Result<BoxStream<Result<StepDelta, LlmError>>, LlmError> {
        let rx = self.create_stream_channel(req, None).await?;
        Ok(receiver_stream(rx))
    }

    async fn complete_object(
        &self,
        req: &StepRequest,
        spec: &ObjectSpec,
    ) -> Result<Value, LlmError> {
        let outcome = self
            .create_once(req, Some(Self::object_response_format(spec)))
            .await?;
        serde_json::from_str(&outcome.text).map_err(|e| LlmError::BadObject(e.to_string()))
    }

    async fn complete_object_stream(
        &self,
        req: &StepRequest,
        spec: &ObjectSpec,
    ) -> Result<BoxStream<Result<String, LlmError>>, LlmError> {
        let rx = self
            .create_stream_channel(req, Some(Self::object_response_format(spec)))
            .await?;
        let stream = receiver_stream(rx).filter_map(|item| async move {
            match item {
                Ok(StepDelta::Text(text)) => Some(Ok(text)),
                // 结构化流中不应出现工具调用，忽略
                Ok(StepDelta::ToolCall(_)) => None,
                Err(e) => Some(Err(e)),
            }
        });
        Ok(Box::pin(stream))
    }
}
