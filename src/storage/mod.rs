//! 存储层（Storage）
//!
//! ## 职责
//!
//! - `DocumentStore`：文档集合抽象，只提供 insert / find 能力
//! - `MemoryStore` / `SqliteStore`：两种实现，进程启动时选定并注入
//! - `repository`：按集合封装的类型化读写与聚合查询
//!
//! 所有写入的文档都由存储生成 id（UUID v4）与 `created_at`。

pub mod memory;
pub mod repository;
pub mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;

use crate::config::{Config, StorageBackend};
use crate::error::StorageResult;

pub use memory::MemoryStore;
pub use repository::{
    ConversationRepository, MathRepository, RubricRepository, WritingRepository,
};
pub use sqlite::SqliteStore;

/// 逻辑集合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// 对话记录
    ConversationTurns,
    /// 已评估作文
    Writings,
    /// 已评估数学题
    MathProblems,
    /// 作文评分标准（只读）
    WritingCriteria,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::ConversationTurns => "chat_history",
            Collection::Writings => "eng_writings",
            Collection::MathProblems => "math_problems",
            Collection::WritingCriteria => "writing_criteria",
        }
    }
}

/// 已存储的文档
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub body: JsonValue,
    pub created_at: DateTime<Utc>,
}

/// 查询条件
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// 全部文档
    All,
    /// 文档顶层字段等于给定值
    Eq { field: &'static str, value: JsonValue },
    /// `created_at` 落在闭区间内
    CreatedBetween {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl Filter {
    pub fn eq(field: &'static str, value: impl Into<JsonValue>) -> Self {
        Filter::Eq {
            field,
            value: value.into(),
        }
    }

    /// 内存中判断文档是否满足条件
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq { field, value } => doc.body.get(*field) == Some(value),
            Filter::CreatedBetween { start, end } => {
                doc.created_at >= *start && doc.created_at <= *end
            }
        }
    }
}

/// 排序方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// 按写入顺序
    #[default]
    Inserted,
    /// 按 `created_at` 倒序，同一时刻按写入顺序倒序
    NewestFirst,
}

/// 查询选项
#[derive(Debug, Clone, Copy, Default)]
pub struct FindOptions {
    pub sort: SortOrder,
    pub limit: Option<usize>,
}

impl FindOptions {
    pub fn newest(limit: usize) -> Self {
        Self {
            sort: SortOrder::NewestFirst,
            limit: Some(limit),
        }
    }
}

/// 文档存储抽象
///
/// 实现必须允许多个请求并发调用，调用方不做额外加锁。
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// 后端名称（日志用）
    fn backend_name(&self) -> &'static str;

    /// 写入单个文档，返回生成的 id
    async fn insert_one(&self, collection: Collection, body: JsonValue) -> StorageResult<String>;

    /// 批量写入；全部成功或全部失败
    async fn insert_many(
        &self,
        collection: Collection,
        bodies: Vec<JsonValue>,
    ) -> StorageResult<Vec<String>>;

    /// 条件查询
    async fn find(
        &self,
        collection: Collection,
        filter: Filter,
        options: FindOptions,
    ) -> StorageResult<Vec<Document>>;

    /// 按 id 查询
    async fn find_by_id(&self, collection: Collection, id: &str)
        -> StorageResult<Option<Document>>;

    /// 集合中的文档数量
    async fn count(&self, collection: Collection) -> StorageResult<usize>;
}

/// 根据配置打开存储
pub fn open_store(config: &Config) -> StorageResult<Arc<dyn DocumentStore>> {
    match config.storage_backend {
        StorageBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        StorageBackend::Sqlite => Ok(Arc::new(SqliteStore::open(
            &config.database_path,
            config.storage_timeout(),
        )?)),
    }
}

/// 生成新的文档 id
pub(crate) fn new_document_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
