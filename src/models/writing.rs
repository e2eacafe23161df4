use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 单项评分标准的得分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriterionScore {
    pub criterion: String,
    pub score: i64,
    pub reason: String,
}

/// 某一维度下的全部评分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricScore {
    pub dimension: String,
    pub criteria: Vec<CriterionScore>,
}

/// 已评估的作文
///
/// `overall_score` 保存模型给出的原值，不做二次计算。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WritingArtifact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub title: String,
    pub text: String,
    pub genre: String,
    pub subjects: Vec<String>,
    pub rubric_scores: Vec<RubricScore>,
    pub overall_score: i64,
    pub feedback_student: String,
    pub feedback_parent: String,
    pub improved_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl WritingArtifact {
    /// 遍历所有评分项
    pub fn criteria(&self) -> impl Iterator<Item = &CriterionScore> {
        self.rubric_scores.iter().flat_map(|d| d.criteria.iter())
    }
}

/// 评分标准集合中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricCriterion {
    pub dimension: String,
    pub criterion: String,
}

/// 按维度分组后的评分标准
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Rubric {
    pub dimensions: Vec<RubricDimension>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RubricDimension {
    pub dimension: String,
    pub criteria: Vec<String>,
}

impl Rubric {
    /// 按维度首次出现的顺序分组
    pub fn group(entries: impl IntoIterator<Item = RubricCriterion>) -> Self {
        let mut dimensions: Vec<RubricDimension> = Vec::new();
        for entry in entries {
            match dimensions.iter_mut().find(|d| d.dimension == entry.dimension) {
                Some(dim) => dim.criteria.push(entry.criterion),
                None => dimensions.push(RubricDimension {
                    dimension: entry.dimension,
                    criteria: vec![entry.criterion],
                }),
            }
        }
        Self { dimensions }
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }
}

/// 模型给出的体裁与主题
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenreSubjects {
    pub genre: String,
    pub subjects: Vec<String>,
}

/// 模型给出的完整评估
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritingEvaluation {
    pub overall_score: i64,
    pub rubric_scores: Vec<RubricScore>,
    pub feedback_student: String,
    pub feedback_parent: String,
    pub improved_text: String,
}

/// 常见薄弱项（低分评分项的聚合结果）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weakness {
    pub criterion: String,
    pub count: usize,
    pub avg_score: f64,
}
