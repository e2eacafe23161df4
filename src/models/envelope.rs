//! 对外的请求 / 响应结构
//!
//! 字段命名保持与前端约定一致（`userMsgId`、`AIMsg` 等）。

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::ValidationError;
use crate::models::turn::{FormKind, Role, TurnKind};

/// 入站请求
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub content: String,
    pub turn_kind: TurnKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_kind: Option<FormKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<JsonValue>,
}

impl ChatRequest {
    /// 自由文本消息
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            turn_kind: TurnKind::Text,
            form_kind: None,
            payload: None,
        }
    }

    /// 表单提交
    pub fn form(form_kind: FormKind, payload: JsonValue) -> Self {
        Self {
            role: Role::User,
            content: String::new(),
            turn_kind: TurnKind::Form,
            form_kind: Some(form_kind),
            payload: Some(payload),
        }
    }
}

/// 出站响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(rename = "userMsgId")]
    pub user_msg_id: String,
    #[serde(rename = "AIMsg")]
    pub ai_msg: AiMessage,
}

/// 响应中的助手消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiMessage {
    pub id: String,
    pub role: Role,
    pub turn_kind: TurnKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_kind: Option<FormKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<JsonValue>,
}

/// 作文表单内容
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WritingSubmission {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
}

impl WritingSubmission {
    pub fn from_payload(payload: Option<&JsonValue>) -> Result<Self, ValidationError> {
        let submission: Self = match payload {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ValidationError::InvalidPayload(e.to_string()))?,
            None => Self::default(),
        };
        if submission.text.trim().is_empty() {
            return Err(ValidationError::MissingPayloadField { field: "text" });
        }
        Ok(submission)
    }
}

/// 数学表单内容
///
/// 未提供 `problem_text` 时由流程自动出题。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MathSubmission {
    #[serde(default)]
    pub problem_text: Option<String>,
    #[serde(default)]
    pub problem_type: Option<String>,
    #[serde(default)]
    pub difficulty_level: Option<String>,
    #[serde(default)]
    pub correct_answer: Option<String>,
    #[serde(default)]
    pub student_answer: String,
    #[serde(default)]
    pub hints_used: Vec<String>,
    #[serde(default)]
    pub time_spent_seconds: u64,
}

impl MathSubmission {
    pub fn from_payload(payload: Option<&JsonValue>) -> Result<Self, ValidationError> {
        match payload {
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| ValidationError::InvalidPayload(e.to_string())),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_accepts_unknown_kinds() {
        let request: ChatRequest = serde_json::from_value(json!({
            "role": "user",
            "content": "",
            "turn_kind": "voice",
            "form_kind": "drawing"
        }))
        .unwrap();

        assert_eq!(request.turn_kind, TurnKind::Unknown);
        assert_eq!(request.form_kind, Some(FormKind::Unknown));
    }

    #[test]
    fn test_response_field_names() {
        let response = ChatResponse {
            user_msg_id: "u1".to_string(),
            ai_msg: AiMessage {
                id: "a1".to_string(),
                role: Role::Assistant,
                turn_kind: TurnKind::Text,
                content: "hi".to_string(),
                form_kind: None,
                payload: None,
            },
        };
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["userMsgId"], "u1");
        assert_eq!(value["AIMsg"]["role"], "assistant");
        assert!(value["AIMsg"].get("form_kind").is_none());
    }

    #[test]
    fn test_writing_submission_requires_text() {
        let err = WritingSubmission::from_payload(Some(&json!({"title": "Empty"}))).unwrap_err();
        assert!(matches!(
            err,
            ValidationError::MissingPayloadField { field: "text" }
        ));
    }
}
