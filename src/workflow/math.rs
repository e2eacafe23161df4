//! 数学题流程
//!
//! Prepare → Evaluate → Save。对错在本地比较，模型只负责写给孩子的讲解。

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use tracing::info;

use crate::clients::ChatMessage;
use crate::error::{AppError, AppResult, ValidationError};
use crate::models::{MathProblemArtifact, MathSubmission};
use crate::services::ModelGateway;
use crate::storage::MathRepository;
use crate::workflow::pipeline::{run_pipeline, Pipeline};
use crate::workflow::state::WorkflowOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathStage {
    Prepare,
    Evaluate,
    Save,
}

const STAGES: &[MathStage] = &[MathStage::Prepare, MathStage::Evaluate, MathStage::Save];

/// 一道题
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MathProblem {
    pub problem_text: String,
    pub problem_type: String,
    pub difficulty_level: String,
    pub correct_answer: String,
}

impl MathProblem {
    /// 没有收到题目时使用的入门算术题
    pub fn beginner_default() -> Self {
        Self {
            problem_text: "What is 2 + 2?".to_string(),
            problem_type: "arithmetic".to_string(),
            difficulty_level: "beginner".to_string(),
            correct_answer: "4".to_string(),
        }
    }
}

#[derive(Debug)]
pub enum MathUpdate {
    Prepared(MathProblem),
    Evaluated {
        is_correct: bool,
        feedback_student: String,
    },
    Saved(JsonValue),
}

#[derive(Debug, Clone, Default)]
pub struct MathWorkflowState {
    pub submission: MathSubmission,
    pub problem: Option<MathProblem>,
    pub is_correct: bool,
    pub feedback_student: String,
    pub result: Option<JsonValue>,
}

/// 数学题流程
pub struct MathWorkflow {
    gateway: ModelGateway,
    problems: MathRepository,
}

impl MathWorkflow {
    pub fn new(gateway: ModelGateway, problems: MathRepository) -> Self {
        Self { gateway, problems }
    }

    pub async fn run(&self, payload: Option<&JsonValue>) -> AppResult<WorkflowOutcome> {
        let submission = MathSubmission::from_payload(payload)?;
        let state = MathWorkflowState {
            submission,
            ..Default::default()
        };
        let state = run_pipeline(self, state).await?;

        Ok(WorkflowOutcome {
            ai_content: String::new(),
            workflow_result: state.result,
        })
    }

    async fn evaluate(&self, state: &MathWorkflowState) -> AppResult<MathUpdate> {
        let problem = state.problem.as_ref().ok_or(AppError::StageInput("problem"))?;
        let student_answer = &state.submission.student_answer;
        let is_correct = is_correct_answer(student_answer, &problem.correct_answer);

        let prompt = format!(
            "The student answered \"{}\" to the problem \"{}\".\n\
             The correct answer is \"{}\".\n\
             The answer is {}.\n\
             Provide encouraging feedback suitable for a child, explaining why the answer is right or wrong.",
            student_answer,
            problem.problem_text,
            problem.correct_answer,
            if is_correct { "correct" } else { "incorrect" }
        );
        let feedback_student = self.gateway.invoke(&[ChatMessage::user(prompt)]).await?;

        info!(
            "🧮 数学题 \"{}\" 评估完成: {}",
            problem.problem_text,
            if is_correct { "✅ 正确" } else { "❌ 错误" }
        );
        Ok(MathUpdate::Evaluated {
            is_correct,
            feedback_student,
        })
    }

    async fn save(&self, state: &MathWorkflowState) -> AppResult<MathUpdate> {
        let problem = state.problem.clone().ok_or(AppError::StageInput("problem"))?;
        let submission = &state.submission;

        let artifact = MathProblemArtifact {
            id: None,
            feedback_parent: parent_summary(&problem, submission, state.is_correct),
            problem_text: problem.problem_text,
            problem_type: problem.problem_type,
            difficulty_level: problem.difficulty_level,
            correct_answer: problem.correct_answer,
            student_answer: submission.student_answer.clone(),
            is_correct: state.is_correct,
            feedback_student: state.feedback_student.clone(),
            hints_used: submission.hints_used.clone(),
            time_spent_seconds: submission.time_spent_seconds,
            created_at: None,
        };

        let id = self.problems.insert(&artifact).await?;
        info!("💾 数学题已保存: {}", id);

        Ok(MathUpdate::Saved(json!({
            "mathId": id,
            "isCorrect": artifact.is_correct,
            "correctAnswer": artifact.correct_answer,
            "feedback": artifact.feedback_student,
        })))
    }
}

#[async_trait]
impl Pipeline for MathWorkflow {
    type State = MathWorkflowState;
    type Stage = MathStage;
    type Update = MathUpdate;

    fn name(&self) -> &'static str {
        "math"
    }

    fn stages(&self) -> &'static [MathStage] {
        STAGES
    }

    async fn execute(&self, stage: MathStage, state: &MathWorkflowState) -> AppResult<MathUpdate> {
        match stage {
            MathStage::Prepare => prepare(&state.submission).map(MathUpdate::Prepared),
            MathStage::Evaluate => self.evaluate(state).await,
            MathStage::Save => self.save(state).await,
        }
    }

    fn apply(&self, state: &mut MathWorkflowState, update: MathUpdate) {
        match update {
            MathUpdate::Prepared(problem) => state.problem = Some(problem),
            MathUpdate::Evaluated {
                is_correct,
                feedback_student,
            } => {
                state.is_correct = is_correct;
                state.feedback_student = feedback_student;
            }
            MathUpdate::Saved(result) => state.result = Some(result),
        }
    }
}

/// 载荷里有题目就用它，否则出默认题
fn prepare(submission: &MathSubmission) -> AppResult<MathProblem> {
    let Some(problem_text) = submission
        .problem_text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
    else {
        return Ok(MathProblem::beginner_default());
    };

    let correct_answer = submission
        .correct_answer
        .clone()
        .ok_or(ValidationError::MissingPayloadField {
            field: "correct_answer",
        })?;

    Ok(MathProblem {
        problem_text: problem_text.to_string(),
        problem_type: submission
            .problem_type
            .clone()
            .unwrap_or_else(|| "arithmetic".to_string()),
        difficulty_level: submission
            .difficulty_level
            .clone()
            .unwrap_or_else(|| "beginner".to_string()),
        correct_answer,
    })
}

/// 去掉首尾空白后逐字比较
pub fn is_correct_answer(student_answer: &str, correct_answer: &str) -> bool {
    student_answer.trim() == correct_answer.trim()
}

fn parent_summary(problem: &MathProblem, submission: &MathSubmission, is_correct: bool) -> String {
    let hints = if submission.hints_used.is_empty() {
        "no hints".to_string()
    } else {
        format!("hints used: {}", submission.hints_used.join(", "))
    };
    format!(
        "Problem ({}, {}): {} Student answered \"{}\" (correct answer \"{}\"), which is {}. {}; time spent: {}s.",
        problem.problem_type,
        problem.difficulty_level,
        problem.problem_text,
        submission.student_answer,
        problem.correct_answer,
        if is_correct { "correct" } else { "incorrect" },
        hints,
        submission.time_spent_seconds
    )
}
