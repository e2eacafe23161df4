use std::sync::Arc;

use crate::error::{StorageError, StorageResult};
use crate::models::ConversationTurn;
use crate::storage::repository::{from_document, to_body};
use crate::storage::{Collection, DocumentStore, Filter, FindOptions};

/// 对话记录仓储
#[derive(Clone)]
pub struct ConversationRepository {
    store: Arc<dyn DocumentStore>,
}

impl ConversationRepository {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// 一次写入用户与助手两条记录，返回 `(user_id, assistant_id)`
    ///
    /// 两条记录在同一批次内写入，要么都落库，要么都不落库。
    pub async fn append_exchange(
        &self,
        user: &ConversationTurn,
        assistant: &ConversationTurn,
    ) -> StorageResult<(String, String)> {
        let bodies = vec![to_body(user)?, to_body(assistant)?];
        let ids = self
            .store
            .insert_many(Collection::ConversationTurns, bodies)
            .await?;

        match <[String; 2]>::try_from(ids) {
            Ok([user_id, assistant_id]) => Ok((user_id, assistant_id)),
            Err(ids) => Err(StorageError::Task(format!(
                "对话写入应返回 2 个 id，实际返回 {} 个",
                ids.len()
            ))),
        }
    }

    /// 最近 n 条记录（新的在前）
    pub async fn recent(&self, n: usize) -> StorageResult<Vec<ConversationTurn>> {
        self.store
            .find(
                Collection::ConversationTurns,
                Filter::All,
                FindOptions::newest(n),
            )
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    pub async fn count(&self) -> StorageResult<usize> {
        self.store.count(Collection::ConversationTurns).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FormKind, Role, TurnKind};
    use crate::storage::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_append_exchange_writes_two_turns() {
        let repo = ConversationRepository::new(Arc::new(MemoryStore::new()));
        let user = ConversationTurn::new(
            Role::User,
            TurnKind::Form,
            Some(FormKind::Writing),
            "",
            Some(json!({"title": "T", "text": "X"})),
        );
        let assistant = ConversationTurn::new(
            Role::Assistant,
            TurnKind::Form,
            Some(FormKind::Writing),
            "",
            Some(json!({"overallScore": 8})),
        );

        let (user_id, ai_id) = repo.append_exchange(&user, &assistant).await.unwrap();
        assert_ne!(user_id, ai_id);
        assert_eq!(repo.count().await.unwrap(), 2);

        let recent = repo.recent(2).await.unwrap();
        assert_eq!(recent[0].role, Role::Assistant);
        assert_eq!(recent[0].id.as_deref(), Some(ai_id.as_str()));
        assert_eq!(recent[1].payload, Some(json!({"title": "T", "text": "X"})));
    }
}
