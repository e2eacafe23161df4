use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::StorageResult;
use crate::models::{Weakness, WritingArtifact};
use crate::storage::repository::{from_document, to_body};
use crate::storage::{Collection, DocumentStore, Filter, FindOptions};

/// 评分低于该值的评分项计为薄弱项
pub const WEAKNESS_THRESHOLD: i64 = 7;

/// 作文仓储
#[derive(Clone)]
pub struct WritingRepository {
    store: Arc<dyn DocumentStore>,
}

impl WritingRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// 保存评估结果，返回生成的 id
    pub async fn insert(&self, artifact: &WritingArtifact) -> StorageResult<String> {
        self.store
            .insert_one(Collection::Writings, to_body(artifact)?)
            .await
    }

    pub async fn by_id(&self, id: &str) -> StorageResult<Option<WritingArtifact>> {
        self.store
            .find_by_id(Collection::Writings, id)
            .await?
            .map(from_document)
            .transpose()
    }

    /// 最近 n 篇（新的在前）
    pub async fn recent(&self, n: usize) -> StorageResult<Vec<WritingArtifact>> {
        self.find(Filter::All, FindOptions::newest(n)).await
    }

    pub async fn by_genre(&self, genre: &str) -> StorageResult<Vec<WritingArtifact>> {
        self.find(Filter::eq("genre", genre), FindOptions::default())
            .await
    }

    /// `created_at` 落在 `[start, end]` 内的作文
    pub async fn created_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StorageResult<Vec<WritingArtifact>> {
        self.find(Filter::CreatedBetween { start, end }, FindOptions::default())
            .await
    }

    /// 平均总分，可按体裁过滤；没有作文时为 0.0
    pub async fn average_score(&self, genre: Option<&str>) -> StorageResult<f64> {
        let writings = match genre {
            Some(genre) => self.by_genre(genre).await?,
            None => self.find(Filter::All, FindOptions::default()).await?,
        };

        let scores: Vec<i64> = writings
            .iter()
            .map(|w| w.overall_score)
            .filter(|score| *score != 0)
            .collect();

        if scores.is_empty() {
            return Ok(0.0);
        }
        Ok(scores.iter().sum::<i64>() as f64 / scores.len() as f64)
    }

    /// 最常见的 n 个薄弱项
    pub async fn common_weaknesses(&self, n: usize) -> StorageResult<Vec<Weakness>> {
        let writings = self.find(Filter::All, FindOptions::default()).await?;
        Ok(aggregate_weaknesses(&writings, n))
    }

    /// 出现次数最多的薄弱项名称
    pub async fn top_weakness(&self) -> StorageResult<Option<String>> {
        Ok(self
            .common_weaknesses(1)
            .await?
            .into_iter()
            .next()
            .map(|w| w.criterion))
    }

    async fn find(
        &self,
        filter: Filter,
        options: FindOptions,
    ) -> StorageResult<Vec<WritingArtifact>> {
        self.store
            .find(Collection::Writings, filter, options)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }
}

/// 按评分项名称聚合低分项，按出现次数倒序；次数相同保持首次出现顺序
pub fn aggregate_weaknesses(writings: &[WritingArtifact], n: usize) -> Vec<Weakness> {
    // (criterion, count, score_sum)
    let mut groups: Vec<(String, usize, i64)> = Vec::new();

    for criterion in writings.iter().flat_map(WritingArtifact::criteria) {
        if criterion.score >= WEAKNESS_THRESHOLD {
            continue;
        }
        match groups.iter_mut().find(|(name, _, _)| *name == criterion.criterion) {
            Some(group) => {
                group.1 += 1;
                group.2 += criterion.score;
            }
            None => groups.push((criterion.criterion.clone(), 1, criterion.score)),
        }
    }

    groups.sort_by(|a, b| b.1.cmp(&a.1));
    groups
        .into_iter()
        .take(n)
        .map(|(criterion, count, sum)| Weakness {
            criterion,
            count,
            avg_score: sum as f64 / count as f64,
        })
        .collect()
}
