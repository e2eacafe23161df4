use std::sync::Arc;

use crate::error::StorageResult;
use crate::models::{MathProblemArtifact, MistakePattern};
use crate::storage::repository::{from_document, to_body};
use crate::storage::{Collection, DocumentStore, Filter, FindOptions};

/// 每种错题模式最多保留的错误答案样本
const MAX_SAMPLE_ANSWERS: usize = 3;

/// 数学题仓储
#[derive(Clone)]
pub struct MathRepository {
    store: Arc<dyn DocumentStore>,
}

impl MathRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn insert(&self, artifact: &MathProblemArtifact) -> StorageResult<String> {
        self.store
            .insert_one(Collection::MathProblems, to_body(artifact)?)
            .await
    }

    pub async fn by_id(&self, id: &str) -> StorageResult<Option<MathProblemArtifact>> {
        self.store
            .find_by_id(Collection::MathProblems, id)
            .await?
            .map(from_document)
            .transpose()
    }

    pub async fn recent(&self, n: usize) -> StorageResult<Vec<MathProblemArtifact>> {
        self.find(Filter::All, FindOptions::newest(n)).await
    }

    /// 正确率（0.0 ~ 1.0），可按题型过滤；没有记录时为 0.0
    pub async fn accuracy(&self, problem_type: Option<&str>) -> StorageResult<f64> {
        let filter = match problem_type {
            Some(t) => Filter::eq("problem_type", t),
            None => Filter::All,
        };
        let problems = self.find(filter, FindOptions::default()).await?;

        if problems.is_empty() {
            return Ok(0.0);
        }
        let correct = problems.iter().filter(|p| p.is_correct).count();
        Ok(correct as f64 / problems.len() as f64)
    }

    /// 按 (题型, 难度) 聚合错题，按次数倒序取前 n 组
    pub async fn common_mistakes(&self, n: usize) -> StorageResult<Vec<MistakePattern>> {
        let problems = self
            .find(Filter::eq("is_correct", false), FindOptions::default())
            .await?;
        Ok(aggregate_mistakes(&problems, n))
    }

    async fn find(
        &self,
        filter: Filter,
        options: FindOptions,
    ) -> StorageResult<Vec<MathProblemArtifact>> {
        self.store
            .find(Collection::MathProblems, filter, options)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }
}

fn aggregate_mistakes(problems: &[MathProblemArtifact], n: usize) -> Vec<MistakePattern> {
    let mut patterns: Vec<MistakePattern> = Vec::new();

    for problem in problems.iter().filter(|p| !p.is_correct) {
        let existing = patterns.iter_mut().find(|p| {
            p.problem_type == problem.problem_type && p.difficulty_level == problem.difficulty_level
        });
        match existing {
            Some(pattern) => {
                pattern.count += 1;
                if pattern.sample_answers.len() < MAX_SAMPLE_ANSWERS {
                    pattern.sample_answers.push(problem.student_answer.clone());
                }
            }
            None => patterns.push(MistakePattern {
                problem_type: problem.problem_type.clone(),
                difficulty_level: problem.difficulty_level.clone(),
                count: 1,
                sample_answers: vec![problem.student_answer.clone()],
            }),
        }
    }

    patterns.sort_by(|a, b| b.count.cmp(&a.count));
    patterns.truncate(n);
    patterns
}
