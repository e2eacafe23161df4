//! Supervisor - 流程层入口
//!
//! 核心职责：
//! 1. 判断请求该交给哪个子工作流（表单按类型，文本由模型分类）
//! 2. 执行子工作流，把结果合并进请求状态
//! 3. 一次性写入用户与助手两条对话记录
//!
//! 路由为 `Error` 时直接返回 `RoutingError`，不写任何记录。

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AppError, AppResult, RoutingError};
use crate::models::{AiMessage, ChatRequest, ChatResponse, FormKind, Role, TurnKind};
use crate::services::{AnalysisTools, ModelGateway};
use crate::storage::{
    ConversationRepository, DocumentStore, MathRepository, RubricRepository, WritingRepository,
};
use crate::utils::logging::truncate_text;
use crate::workflow::analysis::AnalysisWorkflow;
use crate::workflow::general::GeneralWorkflow;
use crate::workflow::math::MathWorkflow;
use crate::workflow::state::{SupervisorState, WorkflowOutcome};
use crate::workflow::writing::WritingWorkflow;

/// 文本分类回复中表示"与学习系统相关"的标记
const SYSTEM_RELATED: &str = "system_related";

/// 路由目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Writing,
    Math,
    Analysis,
    General,
    Error,
}

/// Supervisor
///
/// - 持有网关与各子工作流，可在多个请求间共享
/// - 每次 `handle` 只处理一个请求，执行到底
pub struct Supervisor {
    gateway: ModelGateway,
    conversations: ConversationRepository,
    writing: WritingWorkflow,
    math: MathWorkflow,
    analysis: AnalysisWorkflow,
    general: GeneralWorkflow,
}

impl Supervisor {
    pub fn new(gateway: ModelGateway, store: Arc<dyn DocumentStore>) -> Self {
        let writings = WritingRepository::new(Arc::clone(&store));

        Self {
            conversations: ConversationRepository::new(Arc::clone(&store)),
            writing: WritingWorkflow::new(
                gateway.clone(),
                RubricRepository::new(Arc::clone(&store)),
                writings.clone(),
            ),
            math: MathWorkflow::new(gateway.clone(), MathRepository::new(Arc::clone(&store))),
            analysis: AnalysisWorkflow::new(
                gateway.clone(),
                AnalysisTools::new(writings, MathRepository::new(Arc::clone(&store))),
            ),
            general: GeneralWorkflow::new(gateway.clone()),
            gateway,
        }
    }

    /// 决定路由
    ///
    /// 只有文本消息会调用模型；模型调用失败直接返回错误，不退回到 General。
    pub async fn route(&self, state: &SupervisorState) -> AppResult<Route> {
        match state.turn_kind {
            TurnKind::Form => Ok(match state.form_kind {
                Some(FormKind::Writing) => Route::Writing,
                Some(FormKind::Math) => Route::Math,
                _ => Route::Error,
            }),
            TurnKind::Text => {
                let prompt = format!(
                    "Classify this user message into one of these categories:\n\
                     1. \"system_related\" - Questions about writing skills, analysis, improvement, \
                     or anything related to this learning system\n\
                     2. \"general\" - General conversation, greetings, or topics not related to the learning system\n\n\
                     User message: {}\n\n\
                     Return only \"system_related\" or \"general\".",
                    state.user_content
                );
                let reply = self.gateway.invoke_prompt(&prompt).await?;
                Ok(route_for_classification(&reply))
            }
            TurnKind::Unknown => Ok(Route::Error),
        }
    }

    /// 处理一个请求
    pub async fn handle(&self, request: ChatRequest) -> AppResult<ChatResponse> {
        let mut state = SupervisorState::from_request(request);
        let route = self.route(&state).await?;
        info!(
            "🧭 {} 路由到 {:?}: {}",
            state,
            route,
            truncate_text(&state.user_content, 30)
        );

        let outcome = self.dispatch(route, &state).await?;
        state.apply_outcome(outcome);

        self.commit(&mut state).await?;
        self.respond(state)
    }

    async fn dispatch(&self, route: Route, state: &SupervisorState) -> AppResult<WorkflowOutcome> {
        match route {
            Route::Writing => self.writing.run(state.payload.as_ref()).await,
            Route::Math => self.math.run(state.payload.as_ref()).await,
            Route::Analysis => self.analysis.run(&state.user_content).await,
            Route::General => self.general.run(&state.user_content).await,
            Route::Error => {
                let err = match state.turn_kind {
                    TurnKind::Form => RoutingError::UnknownFormKind {
                        form_kind: state.form_kind,
                    },
                    turn_kind => RoutingError::UnsupportedTurnKind { turn_kind },
                };
                warn!("⚠️ {} 无法路由: {}", state, err);
                Err(err.into())
            }
        }
    }

    /// 写入两条对话记录并回填 id
    async fn commit(&self, state: &mut SupervisorState) -> AppResult<()> {
        let (user_id, ai_id) = self
            .conversations
            .append_exchange(&state.user_turn(), &state.assistant_turn())
            .await?;
        state.user_turn_id = Some(user_id);
        state.ai_turn_id = Some(ai_id);
        Ok(())
    }

    fn respond(&self, state: SupervisorState) -> AppResult<ChatResponse> {
        let assistant = state.assistant_turn();
        let (Some(user_msg_id), Some(ai_id)) = (state.user_turn_id, state.ai_turn_id) else {
            return Err(AppError::StageInput("turn ids"));
        };

        Ok(ChatResponse {
            user_msg_id,
            ai_msg: AiMessage {
                id: ai_id,
                role: Role::Assistant,
                turn_kind: assistant.turn_kind,
                content: assistant.content,
                form_kind: assistant.form_kind,
                payload: assistant.payload,
            },
        })
    }
}

/// 文本分类回复 → 路由；未知标签一律视为 General
pub fn route_for_classification(reply: &str) -> Route {
    if reply.trim().to_lowercase().contains(SYSTEM_RELATED) {
        Route::Analysis
    } else {
        Route::General
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_reply_is_case_insensitive() {
        assert_eq!(route_for_classification("system_related"), Route::Analysis);
        assert_eq!(route_for_classification("  SYSTEM_RELATED\n"), Route::Analysis);
        assert_eq!(
            route_for_classification("The answer is \"System_Related\"."),
            Route::Analysis
        );
        assert_eq!(route_for_classification("general"), Route::General);
        assert_eq!(route_for_classification("I'm not sure"), Route::General);
        assert_eq!(route_for_classification(""), Route::General);
    }
}
