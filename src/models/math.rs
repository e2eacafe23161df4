use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 已评估的数学题
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MathProblemArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub problem_text: String,
    pub problem_type: String,
    pub difficulty_level: String,
    pub correct_answer: String,
    pub student_answer: String,
    pub is_correct: bool,
    pub feedback_student: String,
    pub feedback_parent: String,
    #[serde(default)]
    pub hints_used: Vec<String>,
    #[serde(default)]
    pub time_spent_seconds: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// 错题聚合：按题型与难度分组
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MistakePattern {
    pub problem_type: String,
    pub difficulty_level: String,
    pub count: usize,
    pub sample_answers: Vec<String>,
}
