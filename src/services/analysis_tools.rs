//! 分析工具 - 业务能力层
//!
//! 分析工作流可调用的只读查询（作文与数学题）与学习建议。工具名称会
//! 原样记录在工作流结果的 `tools_used` 中。

use chrono::{DateTime, Utc};
use phf::phf_map;
use serde::Serialize;

use crate::error::StorageResult;
use crate::models::{MistakePattern, Weakness, WritingArtifact};
use crate::storage::repository::writing::WEAKNESS_THRESHOLD;
use crate::storage::{MathRepository, WritingRepository};

pub const GET_RECENT_WRITINGS: &str = "get_recent_writings";
pub const GET_AVG_SCORE_BY_TYPE: &str = "get_avg_score_by_type";
pub const GET_COMMON_WEAKNESSES: &str = "get_common_weaknesses";
pub const GET_SINGLE_WRITING_DETAILS: &str = "get_single_writing_details";
pub const GET_TOP_WEAKNESS: &str = "get_top_weakness";
pub const SUGGEST_PRACTICE_TOPICS: &str = "suggest_practice_topics";
pub const CREATE_WRITING_PROMPT: &str = "create_writing_prompt";
pub const SEARCH_WRITINGS_BY_DATE: &str = "search_writings_by_date";
pub const SEARCH_WRITINGS_BY_TYPE: &str = "search_writings_by_type";
pub const GET_MATH_ACCURACY: &str = "get_math_accuracy";
pub const GET_COMMON_MATH_MISTAKES: &str = "get_common_math_mistakes";

/// 没有低分记录时的薄弱项描述
pub const NO_WEAKNESS: &str = "No weaknesses found";

/// 评分达到该值计为优点
const STRENGTH_THRESHOLD: i64 = 8;

/// 薄弱项关键字 → 练习主题，按顺序匹配
const PRACTICE_TOPICS: &[(&str, [&str; 3])] = &[
    ("spelling", ["Common sight words", "Phonics patterns", "Word families"]),
    ("grammar", ["Sentence structure", "Punctuation", "Parts of speech"]),
    ("vocabulary", ["Descriptive words", "Action words", "Emotion words"]),
    ("organization", ["Story structure", "Beginning-middle-end", "Topic sentences"]),
    ("content", ["Personal experiences", "Descriptive writing", "Creative stories"]),
];

const DEFAULT_PRACTICE_TOPICS: [&str; 3] = [
    "General writing practice",
    "Reading comprehension",
    "Creative expression",
];

/// 薄弱项关键字 → 改进建议，按顺序匹配
const IMPROVEMENT_SUGGESTIONS: &[(&str, &str)] = &[
    ("spelling", "Practice spelling common words and use a dictionary"),
    ("grammar", "Review basic grammar rules and sentence structure"),
    ("vocabulary", "Read more books to expand vocabulary"),
    ("organization", "Practice organizing ideas with an outline before writing"),
];

/// 练习主题（小写）→ 写作题目
static WRITING_PROMPTS: phf::Map<&'static str, &'static str> = phf_map! {
    "personal experiences" => "Write about your favorite day ever. What made it so special?",
    "descriptive writing" => "Describe your favorite animal. What does it look like, sound like, and how does it move?",
    "creative stories" => "Imagine you found a magic door in your backyard. Where does it lead?",
    "school life" => "Write about something fun you learned at school this week.",
    "family" => "Tell me about someone special in your family. What makes them awesome?",
    "friends" => "Write about playing with your best friend. What do you like to do together?",
    "seasons" => "What's your favorite season? What do you like to do during that time?",
    "animals" => "If you could have any pet, what would it be? Why would you choose that animal?",
};

/// 单篇作文的详细分析
#[derive(Debug, Clone, Serialize)]
pub struct WritingDetails {
    pub writing: WritingArtifact,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub improvement_suggestions: Vec<String>,
}

impl WritingDetails {
    pub fn from_writing(writing: WritingArtifact) -> Self {
        let strengths = describe_criteria(&writing, |score| score >= STRENGTH_THRESHOLD);
        let weaknesses = describe_criteria(&writing, |score| score < WEAKNESS_THRESHOLD);
        let improvement_suggestions = improvement_suggestions(&weaknesses);

        Self {
            writing,
            strengths,
            weaknesses,
            improvement_suggestions,
        }
    }
}

/// 学习分析工具
#[derive(Clone)]
pub struct AnalysisTools {
    writings: WritingRepository,
    math: MathRepository,
}

impl AnalysisTools {
    pub fn new(writings: WritingRepository, math: MathRepository) -> Self {
        Self { writings, math }
    }

    pub async fn get_recent_writings(&self, n: usize) -> StorageResult<Vec<WritingArtifact>> {
        self.writings.recent(n).await
    }

    pub async fn get_avg_score_by_type(&self, genre: Option<&str>) -> StorageResult<f64> {
        self.writings.average_score(genre).await
    }

    pub async fn get_common_weaknesses(&self, n: usize) -> StorageResult<Vec<Weakness>> {
        self.writings.common_weaknesses(n).await
    }

    pub async fn get_top_weakness(&self) -> StorageResult<String> {
        Ok(self
            .writings
            .top_weakness()
            .await?
            .unwrap_or_else(|| NO_WEAKNESS.to_string()))
    }

    /// 作文不存在时返回 `None`
    pub async fn get_single_writing_details(&self, id: &str) -> StorageResult<Option<WritingDetails>> {
        Ok(self
            .writings
            .by_id(id)
            .await?
            .map(WritingDetails::from_writing))
    }

    pub async fn search_writings_by_date(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<WritingArtifact>> {
        self.writings.created_between(start, end).await
    }

    pub async fn search_writings_by_type(&self, genre: &str) -> StorageResult<Vec<WritingArtifact>> {
        self.writings.by_genre(genre).await
    }

    /// 数学题正确率（0.0 ~ 1.0）
    pub async fn get_math_accuracy(&self, problem_type: Option<&str>) -> StorageResult<f64> {
        self.math.accuracy(problem_type).await
    }

    pub async fn get_common_math_mistakes(&self, n: usize) -> StorageResult<Vec<MistakePattern>> {
        self.math.common_mistakes(n).await
    }
}

/// 根据薄弱项推荐练习主题
pub fn suggest_practice_topics(weakness: &str) -> Vec<&'static str> {
    let weakness = weakness.to_lowercase();
    PRACTICE_TOPICS
        .iter()
        .find(|(keyword, _)| weakness.contains(keyword))
        .map_or(DEFAULT_PRACTICE_TOPICS, |(_, topics)| *topics)
        .to_vec()
}

/// 根据主题生成写作题目
pub fn create_writing_prompt(topic: &str) -> String {
    match WRITING_PROMPTS.get(topic.to_lowercase().as_str()) {
        Some(prompt) => prompt.to_string(),
        None => format!("Write a story about {}. Use your imagination!", topic),
    }
}

fn describe_criteria(writing: &WritingArtifact, keep: impl Fn(i64) -> bool) -> Vec<String> {
    writing
        .criteria()
        .filter(|c| keep(c.score))
        .map(|c| format!("{}: {}", c.criterion, c.reason))
        .collect()
}

fn improvement_suggestions(weaknesses: &[String]) -> Vec<String> {
    weaknesses
        .iter()
        .filter_map(|weakness| {
            let weakness = weakness.to_lowercase();
            IMPROVEMENT_SUGGESTIONS
                .iter()
                .find(|(keyword, _)| weakness.contains(keyword))
                .map(|(_, suggestion)| suggestion.to_string())
        })
        .collect()
}
