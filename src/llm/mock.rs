//! 脚本化 Mock 客户端（测试用）
//!
//! 按预置队列依次吐出结果：step 队列耗尽后返回 fallback（默认空文本），
//! 便于测试步数上限等「模型永远想调工具」的场景。记录收到的每个请求，
//! 供断言提示词内容与消息结构。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;
use serde_json::Value;

use crate::llm::{
    BoxStream, LlmClient, LlmError, ObjectSpec, StepDelta, StepOutcome, StepRequest,
};

/// 预置结果队列 + 请求记录
pub struct ScriptedLlmClient {
    outcomes: Mutex<VecDeque<StepOutcome>>,
    objects: Mutex<VecDeque<Value>>,
    fallback: StepOutcome,
    seen: Mutex<Vec<StepRequest>>,
}

impl ScriptedLlmClient {
    pub fn new(outcomes: Vec<StepOutcome>) -> Self {
        Self {
            outcomes: Mutex::new(outcomes.into()),
            objects: Mutex::new(VecDeque::new()),
            fallback: StepOutcome::default(),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// 队列耗尽后每次 step 都返回该结果
    pub fn with_fallback(mut self, fallback: StepOutcome) -> Self {
        self.fallback = fallback;
        self
    }

    /// 预置结构化生成结果
    pub fn with_objects(self, objects: Vec<Value>) -> Self {
        *self.objects.lock().unwrap() = objects.into();
        self
    }

    /// 已收到的请求快照
    pub fn seen_requests(&self) -> Vec<StepRequest> {
        self.seen.lock().unwrap().clone()
    }

    fn next_outcome(&self, req: &StepRequest) -> StepOutcome {
        self.seen.lock().unwrap().push(req.clone());
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn next_object(&self, req: &StepRequest) -> Result<Value, LlmError> {
        self.seen.lock().unwrap().push(req.clone());
        self.objects
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::Api("scripted objects exhausted".to_string()))
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn step(&self, req: &StepRequest) -> Result<StepOutcome, LlmError> {
        Ok(self.next_outcome(req))
    }

    async fn step_stream(
        &self,
        req: &StepRequest,
    ) -> Result<BoxStream<Result<StepDelta, LlmError>>, LlmError> {
        let outcome = self.next_outcome(req);
        let mut deltas: Vec<Result<StepDelta, LlmError>> = Vec::new();
        if !outcome.text.is_empty() {
            // 文本切成两段，模拟增量到达
            let mid = outcome.text.len() / 2;
            let split = outcome
                .text
                .char_indices()
                .map(|(i, _)| i)
                .find(|&i| i >= mid)
                .unwrap_or(0);
            let (head, tail) = outcome.text.split_at(split);
            if !head.is_empty() {
                deltas.push(Ok(StepDelta::Text(head.to_string())));
            }
            if !tail.is_empty() {
                deltas.push(Ok(StepDelta::Text(tail.to_string())));
            }
        }
        for call in outcome.tool_calls {
            deltas.push(Ok(StepDelta::ToolCall(call)));
        }
        Ok(Box::pin(stream::iter(deltas)))
    }

    async fn complete_object(
        &self,
        req: &StepRequest,
        _spec: &ObjectSpec,
    ) -> Result<Value, LlmError> {
        self.next_object(req)
    }

    async fn complete_object_stream(
        &self,
        req: &StepRequest,
        _spec: &ObjectSpec,
    ) -> Result<BoxStream<Result<String, LlmError>>, LlmError> {
        let object = self.next_object(req)?;
        let text = object.to_string();
        // 按字符对半切分，模拟部分快照后跟完整快照
        let chunks: Vec<Result<String, LlmError>> = if text.len() > 1 {
            let mid = text.len() / 2;
            let split = text
                .char_indices()
                .map(|(i, _)| i)
                .find(|&i| i >= mid)
                .unwrap_or(0);
            vec![
                Ok(text[..split].to_string()),
                Ok(text[split..].to_string()),
            ]
        } else {
            vec![Ok(text)]
        };
        Ok(Box::pin(stream::iter(chunks)))
    }
}
