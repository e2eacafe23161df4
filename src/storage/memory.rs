use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;

use crate::error::{StorageError, StorageResult};
use crate::storage::{
    new_document_id, Collection, Document, DocumentStore, Filter, FindOptions, SortOrder,
};

/// 内存文档存储
///
/// 测试和演示用；批量写入在同一把写锁下完成。
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn insert_one(&self, collection: Collection, body: JsonValue) -> StorageResult<String> {
        let mut ids = self.insert_many(collection, vec![body]).await?;
        ids.pop()
            .ok_or_else(|| StorageError::Task("写入后未返回 id".to_string()))
    }

    async fn insert_many(
        &self,
        collection: Collection,
        bodies: Vec<JsonValue>,
    ) -> StorageResult<Vec<String>> {
        let mut guard = self.collections.write().map_err(|_| StorageError::Poisoned)?;
        let docs = guard.entry(collection).or_default();

        let ids = bodies
            .into_iter()
            .map(|body| {
                let id = new_document_id();
                docs.push(Document {
                    id: id.clone(),
                    body,
                    created_at: Utc::now(),
                });
                id
            })
            .collect();

        Ok(ids)
    }

    async fn find(
        &self,
        collection: Collection,
        filter: Filter,
        options: FindOptions,
    ) -> StorageResult<Vec<Document>> {
        let guard = self.collections.read().map_err(|_| StorageError::Poisoned)?;
        let Some(docs) = guard.get(&collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<Document> = docs.iter().filter(|d| filter.matches(d)).cloned().collect();

        if options.sort == SortOrder::NewestFirst {
            matched.reverse();
            matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        if let Some(limit) = options.limit {
            matched.truncate(limit);
        }

        Ok(matched)
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> StorageResult<Option<Document>> {
        let guard = self.collections.read().map_err(|_| StorageError::Poisoned)?;
        Ok(guard
            .get(&collection)
            .and_then(|docs| docs.iter().find(|d| d.id == id).cloned()))
    }

    async fn count(&self, collection: Collection) -> StorageResult<usize> {
        let guard = self.collections.read().map_err(|_| StorageError::Poisoned)?;
        Ok(guard.get(&collection).map_or(0, Vec::len))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_and_find_newest_first() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .insert_one(Collection::Writings, json!({"n": i}))
                .await
                .unwrap();
        }

        let docs = store
            .find(Collection::Writings, Filter::All, FindOptions::newest(2))
            .await
            .unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].body["n"], 4);
        assert_eq!(docs[1].body["n"], 3);
    }

    #[tokio::test]
    async fn test_collections_are_isolated() {
        let store = MemoryStore::new();
        let id = store
            .insert_one(Collection::MathProblems, json!({"problem_text": "1+1"}))
            .await
            .unwrap();

        assert!(store
            .find_by_id(Collection::Writings, &id)
            .await
            .unwrap()
            .is_none());
        assert!(store
            .find_by_id(Collection::MathProblems, &id)
            .await
            .unwrap()
            .is_some());
        assert_eq!(store.count(Collection::ConversationTurns).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_insert_many_returns_ids_in_order() {
        let store = MemoryStore::new();
        let ids = store
            .insert_many(
                Collection::ConversationTurns,
                vec![json!({"role": "user"}), json!({"role": "assistant"})],
            )
            .await
            .unwrap();

        assert_eq!(ids.len(), 2);
        let first = store
            .find_by_id(Collection::ConversationTurns, &ids[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.body["role"], "user");
    }
}
