use std::sync::Arc;

use tracing::info;

use crate::error::StorageResult;
use crate::models::{Rubric, RubricCriterion};
use crate::storage::repository::{from_document, to_body};
use crate::storage::{Collection, DocumentStore, Filter, FindOptions};

/// 评分标准仓储（运行期只读）
#[derive(Clone)]
pub struct RubricRepository {
    store: Arc<dyn DocumentStore>,
}

impl RubricRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// 读取全部评分标准并按维度分组
    ///
    /// 每次调用都重新查询，不做缓存。
    pub async fn fetch(&self) -> StorageResult<Rubric> {
        let entries = self
            .store
            .find(Collection::WritingCriteria, Filter::All, FindOptions::default())
            .await?
            .into_iter()
            .map(from_document::<RubricCriterion>)
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(Rubric::group(entries))
    }

    /// 集合为空时写入初始评分标准，返回写入条数
    pub async fn seed_if_empty(&self, entries: &[RubricCriterion]) -> StorageResult<usize> {
        if entries.is_empty() || self.store.count(Collection::WritingCriteria).await? > 0 {
            return Ok(0);
        }

        let bodies = entries.iter().map(to_body).collect::<StorageResult<Vec<_>>>()?;
        let ids = self
            .store
            .insert_many(Collection::WritingCriteria, bodies)
            .await?;

        info!("📚 已写入 {} 条评分标准", ids.len());
        Ok(ids.len())
    }
}
