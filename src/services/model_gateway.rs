//! 模型网关 - 业务能力层
//!
//! 进程内唯一的模型入口，所有工作流共享同一个实例（`Arc`）。
//! 每次调用都受 `model_timeout_secs` 约束，失败直接向上传播，不做重试。

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::clients::{ChatMessage, ChatModel, OutputSchema};
use crate::error::ModelError;

/// 模型网关
#[derive(Clone)]
pub struct ModelGateway {
    model: Arc<dyn ChatModel>,
    timeout: Duration,
}

impl ModelGateway {
    pub fn new(model: Arc<dyn ChatModel>, timeout: Duration) -> Self {
        Self { model, timeout }
    }

    pub fn model_name(&self) -> &str {
        self.model.model_name()
    }

    /// 普通对话
    pub async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        debug!(
            "网关调用模型，消息数: {}，总长度: {} 字符",
            messages.len(),
            messages.iter().map(|m| m.content.len()).sum::<usize>()
        );
        self.with_timeout(self.model.invoke(messages)).await
    }

    /// 单条用户消息的便捷调用
    pub async fn invoke_prompt(&self, prompt: &str) -> Result<String, ModelError> {
        self.invoke(&[ChatMessage::user(prompt)]).await
    }

    /// 结构化输出
    pub async fn invoke_structured(
        &self,
        messages: &[ChatMessage],
        schema: &OutputSchema,
    ) -> Result<JsonValue, ModelError> {
        self.with_timeout(self.model.invoke_structured(messages, schema))
            .await
    }

    async fn with_timeout<T>(
        &self,
        call: impl std::future::Future<Output = Result<T, ModelError>>,
    ) -> Result<T, ModelError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                warn!("⏱️ 模型调用超时 ({} 秒)", self.timeout.as_secs());
                Err(ModelError::Timeout {
                    secs: self.timeout.as_secs(),
                })
            }
        }
    }
}
