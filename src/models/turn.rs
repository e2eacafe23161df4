use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// 消息发送方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Assistant,
}

/// 消息类型：自由文本或表单提交
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    Text,
    Form,
    /// 无法识别的类型，由路由器拒绝
    #[serde(other)]
    Unknown,
}

/// 表单类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormKind {
    Writing,
    Math,
    #[serde(other)]
    Unknown,
}

/// 一条对话记录
///
/// 写入后不再修改。每次成功的 supervisor 调用产生两条：用户一条、助手一条。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationTurn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub role: Role,
    pub turn_kind: TurnKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_kind: Option<FormKind>,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl ConversationTurn {
    pub fn new(
        role: Role,
        turn_kind: TurnKind,
        form_kind: Option<FormKind>,
        content: impl Into<String>,
        payload: Option<JsonValue>,
    ) -> Self {
        Self {
            id: None,
            role,
            turn_kind,
            form_kind,
            content: content.into(),
            payload,
            created_at: None,
        }
    }
}
