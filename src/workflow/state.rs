//! Supervisor 请求上下文

use std::fmt::Display;

use serde_json::Value as JsonValue;

use crate::models::{ChatRequest, ConversationTurn, FormKind, Role, TurnKind};

/// 单次请求的状态
///
/// 只在一次 supervisor 调用内存在，最后投影为两条对话记录。
#[derive(Debug, Clone)]
pub struct SupervisorState {
    pub turn_kind: TurnKind,
    pub form_kind: Option<FormKind>,
    pub user_content: String,
    pub payload: Option<JsonValue>,
    pub ai_content: String,
    pub workflow_result: Option<JsonValue>,
    pub user_turn_id: Option<String>,
    pub ai_turn_id: Option<String>,
}

impl SupervisorState {
    pub fn from_request(request: ChatRequest) -> Self {
        Self {
            turn_kind: request.turn_kind,
            form_kind: request.form_kind,
            user_content: request.content,
            payload: request.payload,
            ai_content: String::new(),
            workflow_result: None,
            user_turn_id: None,
            ai_turn_id: None,
        }
    }

    /// 合并子工作流的产出
    pub fn apply_outcome(&mut self, outcome: WorkflowOutcome) {
        self.ai_content = outcome.ai_content;
        self.workflow_result = outcome.workflow_result;
    }

    pub fn user_turn(&self) -> ConversationTurn {
        ConversationTurn::new(
            Role::User,
            self.turn_kind,
            self.form_kind,
            self.user_content.clone(),
            self.payload.clone(),
        )
    }

    /// 助手记录；表单提交时携带工作流结果
    pub fn assistant_turn(&self) -> ConversationTurn {
        let payload = match self.turn_kind {
            TurnKind::Form => self.workflow_result.clone(),
            _ => None,
        };
        ConversationTurn::new(
            Role::Assistant,
            self.turn_kind,
            self.form_kind,
            self.ai_content.clone(),
            payload,
        )
    }
}

impl Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.form_kind {
            Some(form_kind) => write!(f, "[{:?}/{:?}]", self.turn_kind, form_kind),
            None => write!(f, "[{:?}]", self.turn_kind),
        }
    }
}

/// 子工作流的统一产出
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowOutcome {
    /// 助手回复文本；表单类工作流为空
    pub ai_content: String,
    /// 结构化结果
    pub workflow_result: Option<JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assistant_payload_only_for_forms() {
        let outcome = WorkflowOutcome {
            ai_content: "Hi!".to_string(),
            workflow_result: Some(json!({"analysis_type": "General"})),
        };

        let mut text = SupervisorState::from_request(ChatRequest::text("hello"));
        text.apply_outcome(outcome.clone());
        assert!(text.assistant_turn().payload.is_none());
        assert_eq!(text.assistant_turn().content, "Hi!");

        let mut form = SupervisorState::from_request(ChatRequest::form(
            FormKind::Math,
            json!({"student_answer": "4"}),
        ));
        form.apply_outcome(outcome);
        assert_eq!(
            form.assistant_turn().payload,
            Some(json!({"analysis_type": "General"}))
        );
        assert_eq!(form.user_turn().payload, Some(json!({"student_answer": "4"})));
    }
}
