//! 作文评估流程
//!
//! 流程顺序：
//! 1. Classify    识别体裁与主题
//! 2. FetchRubric 读取评分标准
//! 3. Evaluate    按评分标准打分并生成反馈
//! 4. Persist     保存评估结果
//! 5. Respond     生成返回给前端的摘要

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::clients::ChatMessage;
use crate::error::{AppError, AppResult, ValidationError};
use crate::models::{
    GenreSubjects, Rubric, WritingArtifact, WritingEvaluation, WritingSubmission,
};
use crate::services::{invoke_with_fallback, ModelGateway, ModelOutput};
use crate::storage::{RubricRepository, WritingRepository};
use crate::utils::logging::truncate_text;
use crate::workflow::pipeline::{run_pipeline, Pipeline};
use crate::workflow::state::WorkflowOutcome;

const MIN_SCORE: i64 = 1;
const MAX_SCORE: i64 = 10;

const TEACHER_SYSTEM_PROMPT: &str = "You are a kind, friendly and professional teacher of a \
     6-year-old boy. Your task is to improve the student's skills.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritingStage {
    Classify,
    FetchRubric,
    Evaluate,
    Persist,
    Respond,
}

const STAGES: &[WritingStage] = &[
    WritingStage::Classify,
    WritingStage::FetchRubric,
    WritingStage::Evaluate,
    WritingStage::Persist,
    WritingStage::Respond,
];

/// 各阶段的产出
#[derive(Debug)]
pub enum WritingUpdate {
    Classified(GenreSubjects),
    RubricLoaded(Rubric),
    Evaluated(WritingEvaluation),
    Persisted(String),
    Responded(JsonValue),
}

#[derive(Debug, Clone, Default)]
pub struct WritingWorkflowState {
    pub submission: WritingSubmission,
    pub genre: String,
    pub subjects: Vec<String>,
    pub rubric: Rubric,
    pub evaluation: Option<WritingEvaluation>,
    pub writing_id: Option<String>,
    pub result: Option<JsonValue>,
}

impl ModelOutput for GenreSubjects {
    const NAME: &'static str = "genre_subjects";
    const REQUIRED_FIELDS: &'static [&'static str] = &["genre", "subjects"];

    fn schema() -> JsonValue {
        json!({
            "type": "object",
            "properties": {
                "genre": {"type": "string"},
                "subjects": {"type": "array", "items": {"type": "string"}}
            },
            "required": ["genre", "subjects"],
            "additionalProperties": false
        })
    }
}

impl ModelOutput for WritingEvaluation {
    const NAME: &'static str = "writing_evaluation";
    const REQUIRED_FIELDS: &'static [&'static str] = &[
        "overall_score",
        "rubric_scores",
        "feedback_student",
        "feedback_parent",
        "improved_text",
    ];

    fn schema() -> JsonValue {
        json!({
            "type": "object",
            "properties": {
                "overall_score": {"type": "integer"},
                "rubric_scores": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "dimension": {"type": "string"},
                            "criteria": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "criterion": {"type": "string"},
                                        "score": {"type": "integer"},
                                        "reason": {"type": "string"}
                                    },
                                    "required": ["criterion", "score", "reason"],
                                    "additionalProperties": false
                                }
                            }
                        },
                        "required": ["dimension", "criteria"],
                        "additionalProperties": false
                    }
                },
                "feedback_student": {"type": "string"},
                "feedback_parent": {"type": "string"},
                "improved_text": {"type": "string"}
            },
            "required": [
                "overall_score",
                "rubric_scores",
                "feedback_student",
                "feedback_parent",
                "improved_text"
            ],
            "additionalProperties": false
        })
    }
}

/// 作文评估流程
pub struct WritingWorkflow {
    gateway: ModelGateway,
    rubrics: RubricRepository,
    writings: WritingRepository,
}

impl WritingWorkflow {
    pub fn new(
        gateway: ModelGateway,
        rubrics: RubricRepository,
        writings: WritingRepository,
    ) -> Self {
        Self {
            gateway,
            rubrics,
            writings,
        }
    }

    /// 评估一次作文提交
    ///
    /// 载荷缺少正文时在调用模型之前失败。
    pub async fn run(&self, payload: Option<&JsonValue>) -> AppResult<WorkflowOutcome> {
        let submission = WritingSubmission::from_payload(payload)?;
        info!(
            "📝 开始评估作文《{}》: {}",
            submission.title,
            truncate_text(&submission.text, 40)
        );

        let state = WritingWorkflowState {
            submission,
            ..Default::default()
        };
        let state = run_pipeline(self, state).await?;

        Ok(WorkflowOutcome {
            ai_content: String::new(),
            workflow_result: state.result,
        })
    }

    async fn classify(&self, state: &WritingWorkflowState) -> AppResult<GenreSubjects> {
        let prompt = format!(
            "Please identify the genre and the subjects of the following writing.\nTitle: {}\nText: {}",
            state.submission.title, state.submission.text
        );
        let result: GenreSubjects =
            invoke_with_fallback(&self.gateway, &[ChatMessage::user(prompt)]).await?;

        info!("✓ 体裁: {}，主题: {:?}", result.genre, result.subjects);
        Ok(result)
    }

    async fn evaluate(&self, state: &WritingWorkflowState) -> AppResult<WritingEvaluation> {
        let rubric = serde_json::to_string(&state.rubric).map_err(AppError::Encoding)?;
        let prompt = format!(
            "Evaluate the following writing based on these criteria (no need to use all, use the applicable ones): {}\n\
             Title: {}\n\
             Text: {}\n\
             Return a rubric scoring (1-10) grouped by dimension, an overall score (1-10), \
             feedback_student (strengths and weaknesses, suggestions, reasons for the score, in a teacher's positive tone), \
             feedback_parent (feedback for parents about the capability of the student) \
             and improved_text (an improved version of the writing).",
            rubric, state.submission.title, state.submission.text
        );
        let messages = [
            ChatMessage::system(TEACHER_SYSTEM_PROMPT),
            ChatMessage::user(prompt),
        ];

        let evaluation: WritingEvaluation = invoke_with_fallback(&self.gateway, &messages).await?;
        validate_scores(&evaluation)?;

        info!("✓ 作文评估完成，总分: {}", evaluation.overall_score);
        Ok(evaluation)
    }

    async fn persist(&self, state: &WritingWorkflowState) -> AppResult<String> {
        let evaluation = state
            .evaluation
            .clone()
            .ok_or(AppError::StageInput("evaluation"))?;

        let artifact = WritingArtifact {
            id: None,
            title: state.submission.title.clone(),
            text: state.submission.text.clone(),
            genre: state.genre.clone(),
            subjects: state.subjects.clone(),
            rubric_scores: evaluation.rubric_scores,
            overall_score: evaluation.overall_score,
            feedback_student: evaluation.feedback_student,
            feedback_parent: evaluation.feedback_parent,
            improved_text: evaluation.improved_text,
            created_at: None,
        };

        let id = self.writings.insert(&artifact).await?;
        info!("💾 作文已保存: {}", id);
        Ok(id)
    }
}

#[async_trait]
impl Pipeline for WritingWorkflow {
    type State = WritingWorkflowState;
    type Stage = WritingStage;
    type Update = WritingUpdate;

    fn name(&self) -> &'static str {
        "writing"
    }

    fn stages(&self) -> &'static [WritingStage] {
        STAGES
    }

    async fn execute(
        &self,
        stage: WritingStage,
        state: &WritingWorkflowState,
    ) -> AppResult<WritingUpdate> {
        match stage {
            WritingStage::Classify => Ok(WritingUpdate::Classified(self.classify(state).await?)),
            WritingStage::FetchRubric => Ok(WritingUpdate::RubricLoaded(self.rubrics.fetch().await?)),
            WritingStage::Evaluate => Ok(WritingUpdate::Evaluated(self.evaluate(state).await?)),
            WritingStage::Persist => Ok(WritingUpdate::Persisted(self.persist(state).await?)),
            WritingStage::Respond => respond(state).map(WritingUpdate::Responded),
        }
    }

    fn apply(&self, state: &mut WritingWorkflowState, update: WritingUpdate) {
        match update {
            WritingUpdate::Classified(GenreSubjects { genre, subjects }) => {
                state.genre = genre;
                state.subjects = subjects;
            }
            WritingUpdate::RubricLoaded(rubric) => state.rubric = rubric,
            WritingUpdate::Evaluated(evaluation) => state.evaluation = Some(evaluation),
            WritingUpdate::Persisted(id) => state.writing_id = Some(id),
            WritingUpdate::Responded(result) => state.result = Some(result),
        }
    }
}

/// 返回给前端的摘要 `{overallScore, writingId, feedback}`
fn respond(state: &WritingWorkflowState) -> AppResult<JsonValue> {
    let evaluation = state
        .evaluation
        .as_ref()
        .ok_or(AppError::StageInput("evaluation"))?;
    let writing_id = state
        .writing_id
        .as_ref()
        .ok_or(AppError::StageInput("writing_id"))?;

    Ok(json!({
        "overallScore": evaluation.overall_score,
        "writingId": writing_id,
        "feedback": evaluation.feedback_student,
    }))
}

/// 所有分数必须是 [1, 10] 内的整数
pub fn validate_scores(evaluation: &WritingEvaluation) -> Result<(), ValidationError> {
    check_score("overall_score", evaluation.overall_score)?;
    for dimension in &evaluation.rubric_scores {
        for criterion in &dimension.criteria {
            check_score(
                &format!("{}/{}", dimension.dimension, criterion.criterion),
                criterion.score,
            )?;
        }
    }
    Ok(())
}

fn check_score(field: &str, score: i64) -> Result<(), ValidationError> {
    if (MIN_SCORE..=MAX_SCORE).contains(&score) {
        Ok(())
    } else {
        Err(ValidationError::ScoreOutOfRange {
            field: field.to_string(),
            score,
        })
    }
}
