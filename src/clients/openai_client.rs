//! OpenAI 兼容的对话模型
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型（Azure, Gemini, Doubao 等兼容服务）
//! - 结构化输出使用 `response_format = json_schema`

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::clients::chat_model::{ChatMessage, ChatModel, ChatRole, OutputSchema};
use crate::config::Config;
use crate::error::ModelError;

/// OpenAI 兼容的对话模型
///
/// HTTP 客户端在第一次调用时构建，之后所有请求共用。
pub struct OpenAiChatModel {
    client: OnceCell<Client<OpenAIConfig>>,
    api_key: String,
    api_base_url: String,
    model_name: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiChatModel {
    pub fn new(config: &Config) -> Self {
        Self {
            client: OnceCell::new(),
            api_key: config.llm_api_key.clone(),
            api_base_url: config.llm_api_base_url.clone(),
            model_name: config.llm_model_name.clone(),
            temperature: config.llm_temperature,
            max_tokens: config.llm_max_tokens,
        }
    }

    async fn client(&self) -> &Client<OpenAIConfig> {
        self.client
            .get_or_init(|| async {
                debug!("构建模型客户端: {}", self.api_base_url);
                let openai_config = OpenAIConfig::new()
                    .with_api_key(&self.api_key)
                    .with_api_base(&self.api_base_url);
                Client::with_config(openai_config)
            })
            .await
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
        response_format: Option<ResponseFormat>,
    ) -> Result<CreateChatCompletionRequest, ModelError> {
        let messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, _>>()?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model_name)
            .messages(messages)
            .temperature(self.temperature)
            .max_completion_tokens(self.max_tokens);
        if let Some(format) = response_format {
            args.response_format(format);
        }

        args.build()
            .map_err(|e| ModelError::RequestBuild(e.to_string()))
    }

    async fn send(&self, request: CreateChatCompletionRequest) -> Result<String, ModelError> {
        let response = self
            .client()
            .await
            .chat()
            .create(request)
            .await
            .map_err(|e| {
                warn!("LLM API 调用失败: {}", e);
                ModelError::Invocation {
                    model: self.model_name.clone(),
                    message: e.to_string(),
                }
            })?;

        debug!("LLM API 调用成功");

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string())
            .unwrap_or_default();

        if content.is_empty() {
            return Err(ModelError::EmptyContent {
                model: self.model_name.clone(),
            });
        }
        Ok(content)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        debug!("调用 LLM API，模型: {}，消息数: {}", self.model_name, messages.len());
        let request = self.build_request(messages, None)?;
        self.send(request).await
    }

    async fn invoke_structured(
        &self,
        messages: &[ChatMessage],
        schema: &OutputSchema,
    ) -> Result<JsonValue, ModelError> {
        debug!("调用 LLM API（结构化输出 {}），模型: {}", schema.name, self.model_name);

        let format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: None,
                name: schema.name.to_string(),
                schema: Some(schema.schema.clone()),
                strict: Some(true),
            },
        };
        let request = self.build_request(messages, Some(format))?;
        let content = self.send(request).await?;

        // 结构化输出的内容本身就是 JSON 文本
        serde_json::from_str(&content).map_err(|e| ModelError::Invocation {
            model: self.model_name.clone(),
            message: format!("结构化输出不是合法 JSON: {}", e),
        })
    }
}

fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage, ModelError> {
    let build_err = |e: async_openai::error::OpenAIError| ModelError::RequestBuild(e.to_string());

    let request_message = match message.role {
        ChatRole::System => ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(message.content.as_str())
                .build()
                .map_err(build_err)?,
        ),
        ChatRole::User => ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(message.content.as_str())
                .build()
                .map_err(build_err)?,
        ),
        ChatRole::Assistant => ChatCompletionRequestMessage::Assistant(
            ChatCompletionRequestAssistantMessageArgs::default()
                .content(message.content.as_str())
                .build()
                .map_err(build_err)?,
        ),
    };
    Ok(request_message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn model() -> OpenAiChatModel {
        let config = Config {
            llm_api_key: "test-key".to_string(),
            ..Config::default()
        };
        OpenAiChatModel::new(&config)
    }

    #[test]
    fn test_build_request_keeps_message_order() {
        let model = model();
        let messages = vec![
            ChatMessage::system("You are a teacher."),
            ChatMessage::user("Hello"),
        ];

        let request = model.build_request(&messages, None).unwrap();
        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.messages.len(), 2);
        assert!(matches!(
            request.messages[0],
            ChatCompletionRequestMessage::System(_)
        ));
        assert!(request.response_format.is_none());
    }

    #[test]
    fn test_build_request_with_schema() {
        let model = model();
        let format = ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: None,
                name: "genre_subjects".to_string(),
                schema: Some(json!({"type": "object"})),
                strict: Some(true),
            },
        };

        let request = model
            .build_request(&[ChatMessage::user("Classify")], Some(format))
            .unwrap();
        assert!(matches!(
            request.response_format,
            Some(ResponseFormat::JsonSchema { .. })
        ));
    }
}
