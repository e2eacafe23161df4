//! 结构化输出策略
//!
//! 先请求模型按 JSON Schema 返回；任何失败（不支持、调用出错、缺字段）都退回到
//! 纯文本调用：在提示词后追加"只返回 JSON"的要求，再交给 `response_parser` 解析。
//! 两条路径产出同一个类型。

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::clients::{ChatMessage, ChatRole, OutputSchema};
use crate::error::AppResult;
use crate::services::model_gateway::ModelGateway;
use crate::services::response_parser;

/// 可由模型结构化产出的类型
pub trait ModelOutput: DeserializeOwned {
    /// schema 名称
    const NAME: &'static str;
    /// 必需字段
    const REQUIRED_FIELDS: &'static [&'static str];

    /// 该类型的 JSON Schema
    fn schema() -> JsonValue;

    /// 退回文本调用时追加到提示词末尾的格式要求
    fn json_instruction() -> String {
        format!(
            "Return ONLY a JSON object with exactly these keys: {}. \
             Do not wrap it in a code block and do not add any words before or after it. \
             The JSON must match this schema: {}",
            Self::REQUIRED_FIELDS.join(", "),
            Self::schema()
        )
    }
}

/// 结构化调用，失败时退回文本解析
pub async fn invoke_with_fallback<T: ModelOutput>(
    gateway: &ModelGateway,
    messages: &[ChatMessage],
) -> AppResult<T> {
    let schema = OutputSchema {
        name: T::NAME,
        schema: T::schema(),
    };

    let structured = match gateway.invoke_structured(messages, &schema).await {
        Ok(value) => response_parser::extract_fields::<T>(value, T::REQUIRED_FIELDS),
        Err(e) => Err(e.into()),
    };

    match structured {
        Ok(output) => {
            debug!("✓ 结构化输出 {} 解析成功", T::NAME);
            Ok(output)
        }
        Err(e) => {
            warn!("⚠️ 结构化输出 {} 失败，改用文本解析: {}", T::NAME, e);
            let text = gateway.invoke(&with_json_instruction::<T>(messages)).await?;
            response_parser::parse_model_output(&text, T::REQUIRED_FIELDS)
        }
    }
}

/// 把格式要求附加到最后一条用户消息上
fn with_json_instruction<T: ModelOutput>(messages: &[ChatMessage]) -> Vec<ChatMessage> {
    let mut messages = messages.to_vec();
    let instruction = T::json_instruction();

    match messages
        .iter_mut()
        .rev()
        .find(|m| m.role == ChatRole::User)
    {
        Some(last_user) => {
            last_user.content.push_str("\n\n");
            last_user.content.push_str(&instruction);
        }
        None => messages.push(ChatMessage::user(instruction)),
    }
    messages
}
