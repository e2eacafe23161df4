//! SQLite 文档存储
//!
//! 所有集合共用一张 `documents` 表，文档体以 JSON 文本保存，
//! 字段过滤通过 `json_extract` 完成。

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use serde_json::Value as JsonValue;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::storage::{
    new_document_id, Collection, Document, DocumentStore, Filter, FindOptions, SortOrder,
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS documents (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        collection TEXT NOT NULL,
        body TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_documents_collection
        ON documents (collection, created_at);
";

/// SQLite 文档存储
///
/// 连接由互斥锁保护，阻塞操作放到 `spawn_blocking` 中执行，并受超时约束。
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
    timeout: Duration,
}

impl SqliteStore {
    /// 打开（或创建）数据库文件；`:memory:` 表示内存数据库
    pub fn open(path: &str, timeout: Duration) -> StorageResult<Self> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        conn.execute_batch(SCHEMA)?;
        debug!("SQLite 存储已打开: {}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            timeout,
        })
    }

    pub fn open_in_memory(timeout: Duration) -> StorageResult<Self> {
        Self::open(":memory:", timeout)
    }

    /// 在阻塞线程上执行数据库操作
    ///
    /// 超时后后台任务不会被取消，写操作必须通过 `Deadline::commit` 提交：
    /// 等待方先标记超时则事务回滚，后台任务先认领则等待其真实结果。
    async fn with_connection<F, T>(&self, operation: &'static str, f: F) -> StorageResult<T>
    where
        F: FnOnce(&mut Connection, &Deadline) -> StorageResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let deadline = Deadline::new(operation, self.timeout);
        let task_deadline = deadline.clone();
        let conn = Arc::clone(&self.conn);
        let mut task = tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StorageError::Poisoned)?;
            if task_deadline.is_expired() {
                return Err(task_deadline.error());
            }
            f(&mut guard, &task_deadline)
        });

        let joined = match tokio::time::timeout(self.timeout, &mut task).await {
            Ok(joined) => joined,
            Err(_) if deadline.expire() => return Err(deadline.error()),
            // 后台任务已认领提交，结果以它为准
            Err(_) => task.await,
        };
        joined.map_err(|e| StorageError::Task(e.to_string()))?
    }
}

const PENDING: u8 = 0;
const CLAIMED: u8 = 1;
const EXPIRED: u8 = 2;

/// 单次操作的截止状态，等待方与后台任务只有一方能改变它
#[derive(Clone)]
struct Deadline {
    state: Arc<AtomicU8>,
    operation: &'static str,
    limit: Duration,
}

impl Deadline {
    fn new(operation: &'static str, limit: Duration) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PENDING)),
            operation,
            limit,
        }
    }

    fn is_expired(&self) -> bool {
        self.state.load(Ordering::Acquire) == EXPIRED
    }

    /// 等待方调用；后台任务已认领时返回 false
    fn expire(&self) -> bool {
        self.state
            .compare_exchange(PENDING, EXPIRED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 认领成功才提交，否则丢弃事务（回滚）并返回超时
    fn commit(&self, tx: Transaction<'_>) -> StorageResult<()> {
        match self
            .state
            .compare_exchange(PENDING, CLAIMED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(tx.commit()?),
            Err(_) => Err(self.error()),
        }
    }

    fn error(&self) -> StorageError {
        StorageError::Timeout {
            operation: self.operation,
            millis: self.limit.as_millis() as u64,
        }
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn insert_one(&self, collection: Collection, body: JsonValue) -> StorageResult<String> {
        let body = serde_json::to_string(&body)?;
        self.with_connection("insert_one", move |conn, deadline| {
            let tx = conn.transaction()?;
            let id = new_document_id();
            tx.execute(
                "INSERT INTO documents (id, collection, body, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, collection.name(), body, format_timestamp(Utc::now())],
            )?;
            deadline.commit(tx)?;
            Ok(id)
        })
        .await
    }

    async fn insert_many(
        &self,
        collection: Collection,
        bodies: Vec<JsonValue>,
    ) -> StorageResult<Vec<String>> {
        let bodies = bodies
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        self.with_connection("insert_many", move |conn, deadline| {
            let tx = conn.transaction()?;
            let mut ids = Vec::with_capacity(bodies.len());
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO documents (id, collection, body, created_at) VALUES (?1, ?2, ?3, ?4)",
                )?;
                for body in &bodies {
                    let id = new_document_id();
                    stmt.execute(params![id, collection.name(), body, format_timestamp(Utc::now())])?;
                    ids.push(id);
                }
            }
            deadline.commit(tx)?;
            Ok(ids)
        })
        .await
    }

    async fn find(
        &self,
        collection: Collection,
        filter: Filter,
        options: FindOptions,
    ) -> StorageResult<Vec<Document>> {
        self.with_connection("find", move |conn, _| {
            let (sql, values) = build_find_query(collection, &filter, options);
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(values), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;

            let mut docs = Vec::new();
            for row in rows {
                let (id, body, created_at) = row?;
                docs.push(Document {
                    id,
                    body: serde_json::from_str(&body)?,
                    created_at: parse_timestamp(&created_at)?,
                });
            }
            Ok(docs)
        })
        .await
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> StorageResult<Option<Document>> {
        let id = id.to_string();
        self.with_connection("find_by_id", move |conn, _| {
            let row = conn
                .query_row(
                    "SELECT id, body, created_at FROM documents WHERE collection = ?1 AND id = ?2",
                    params![collection.name(), id],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;

            row.map(|(id, body, created_at)| -> StorageResult<Document> {
                Ok(Document {
                    id,
                    body: serde_json::from_str(&body)?,
                    created_at: parse_timestamp(&created_at)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn count(&self, collection: Collection) -> StorageResult<usize> {
        self.with_connection("count", move |conn, _| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM documents WHERE collection = ?1",
                params![collection.name()],
                |row| row.get(0),
            )?;
            Ok(count.max(0) as usize)
        })
        .await
    }
}

/// 构建查询语句与参数
fn build_find_query(
    collection: Collection,
    filter: &Filter,
    options: FindOptions,
) -> (String, Vec<SqlValue>) {
    let mut sql = String::from("SELECT id, body, created_at FROM documents WHERE collection = ?");
    let mut values = vec![SqlValue::Text(collection.name().to_string())];

    match filter {
        Filter::All => {}
        Filter::Eq { field, value } => {
            sql.push_str(" AND json_extract(body, ?) = ?");
            values.push(SqlValue::Text(format!("$.{}", field)));
            values.push(to_sql_value(value));
        }
        Filter::CreatedBetween { start, end } => {
            sql.push_str(" AND created_at >= ? AND created_at <= ?");
            values.push(SqlValue::Text(format_timestamp(*start)));
            values.push(SqlValue::Text(format_timestamp(*end)));
        }
    }

    match options.sort {
        SortOrder::Inserted => sql.push_str(" ORDER BY seq ASC"),
        SortOrder::NewestFirst => sql.push_str(" ORDER BY created_at DESC, seq DESC"),
    }

    if let Some(limit) = options.limit {
        sql.push_str(" LIMIT ?");
        values.push(SqlValue::Integer(limit as i64));
    }

    (sql, values)
}

/// JSON 值转换为 `json_extract` 可比较的 SQL 值
fn to_sql_value(value: &JsonValue) -> SqlValue {
    match value {
        JsonValue::Null => SqlValue::Null,
        JsonValue::Bool(b) => SqlValue::Integer(i64::from(*b)),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        JsonValue::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// 固定精度的 RFC 3339，保证字符串顺序与时间顺序一致
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StorageError::InvalidTimestamp(s.to_string()))
}
