//! 日常对话流程
//!
//! 单阶段：固定的儿童导师系统提示 + 用户原话，模型回复原样返回。

use async_trait::async_trait;

use crate::clients::ChatMessage;
use crate::error::{AppError, AppResult};
use crate::services::ModelGateway;
use crate::workflow::pipeline::{run_pipeline, Pipeline};
use crate::workflow::state::WorkflowOutcome;

pub const TUTOR_SYSTEM_PROMPT: &str = "You are an all-round teacher of a 6-year-old boy. \
     Your task is answering his questions. If the question is not appropriate for him, \
     refuse to answer in a friendly tone. Otherwise, respond to him in a way that he can accept.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeneralStage {
    Answer,
}

const STAGES: &[GeneralStage] = &[GeneralStage::Answer];

#[derive(Debug, Clone, Default)]
pub struct GeneralWorkflowState {
    pub user_content: String,
    pub ai_content: Option<String>,
}

/// 日常对话流程
pub struct GeneralWorkflow {
    gateway: ModelGateway,
}

impl GeneralWorkflow {
    pub fn new(gateway: ModelGateway) -> Self {
        Self { gateway }
    }

    pub async fn run(&self, user_content: &str) -> AppResult<WorkflowOutcome> {
        let state = GeneralWorkflowState {
            user_content: user_content.to_string(),
            ai_content: None,
        };
        let state = run_pipeline(self, state).await?;

        Ok(WorkflowOutcome {
            ai_content: state.ai_content.ok_or(AppError::StageInput("ai_content"))?,
            workflow_result: None,
        })
    }
}

#[async_trait]
impl Pipeline for GeneralWorkflow {
    type State = GeneralWorkflowState;
    type Stage = GeneralStage;
    type Update = String;

    fn name(&self) -> &'static str {
        "general"
    }

    fn stages(&self) -> &'static [GeneralStage] {
        STAGES
    }

    async fn execute(&self, stage: GeneralStage, state: &GeneralWorkflowState) -> AppResult<String> {
        match stage {
            GeneralStage::Answer => {
                let messages = [
                    ChatMessage::system(TUTOR_SYSTEM_PROMPT),
                    ChatMessage::user(state.user_content.as_str()),
                ];
                Ok(self.gateway.invoke(&messages).await?)
            }
        }
    }

    fn apply(&self, state: &mut GeneralWorkflowState, update: String) {
        state.ai_content = Some(update);
    }
}
