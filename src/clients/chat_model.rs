//! 对话模型抽象
//!
//! 工作流只依赖 `ChatModel`，具体实现（OpenAI 兼容接口、测试替身）在启动时注入。

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::ModelError;

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// 一条发给模型的消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// 结构化输出的 JSON Schema 描述
#[derive(Debug, Clone, PartialEq)]
pub struct OutputSchema {
    /// schema 名称，只允许字母、数字、下划线
    pub name: &'static str,
    pub schema: JsonValue,
}

/// 对话模型
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// 模型名称（日志和错误信息用）
    fn model_name(&self) -> &str;

    /// 普通对话，返回文本
    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, ModelError>;

    /// 结构化输出，返回符合 schema 的 JSON
    ///
    /// 默认不支持；调用方应退回到 `invoke` + 文本解析。
    async fn invoke_structured(
        &self,
        _messages: &[ChatMessage],
        _schema: &OutputSchema,
    ) -> Result<JsonValue, ModelError> {
        Err(ModelError::StructuredUnsupported {
            model: self.model_name().to_string(),
        })
    }
}
