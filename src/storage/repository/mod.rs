//! 类型化仓储
//!
//! 每个仓储只面向一个集合，负责文档与领域类型之间的转换，
//! 聚合查询（平均分、薄弱项、错题模式）在这里基于 `find` 结果计算。

pub mod conversation;
pub mod math;
pub mod rubric;
pub mod writing;

pub use conversation::ConversationRepository;
pub use math::MathRepository;
pub use rubric::RubricRepository;
pub use writing::WritingRepository;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::error::StorageResult;
use crate::storage::Document;

/// 领域对象转为文档体，`id` 与 `created_at` 由存储生成
pub(crate) fn to_body<T: Serialize>(record: &T) -> StorageResult<JsonValue> {
    let mut body = serde_json::to_value(record)?;
    if let Some(obj) = body.as_object_mut() {
        obj.remove("id");
        obj.remove("created_at");
    }
    Ok(body)
}

/// 文档还原为领域对象，回填 `id` 与 `created_at`
pub(crate) fn from_document<T: DeserializeOwned>(doc: Document) -> StorageResult<T> {
    let Document {
        id,
        mut body,
        created_at,
    } = doc;

    if let Some(obj) = body.as_object_mut() {
        obj.insert("id".to_string(), JsonValue::String(id));
        obj.insert("created_at".to_string(), serde_json::to_value(created_at)?);
    }
    Ok(serde_json::from_value(body)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationTurn, Role, TurnKind};
    use chrono::Utc;

    #[test]
    fn test_body_drops_generated_fields_and_document_restores_them() {
        let mut turn = ConversationTurn::new(Role::User, TurnKind::Text, None, "hi", None);
        turn.id = Some("stale".to_string());

        let body = to_body(&turn).unwrap();
        assert!(body.get("id").is_none());

        let now = Utc::now();
        let restored: ConversationTurn = from_document(Document {
            id: "fresh".to_string(),
            body,
            created_at: now,
        })
        .unwrap();

        assert_eq!(restored.id.as_deref(), Some("fresh"));
        assert_eq!(restored.created_at, Some(now));
        assert_eq!(restored.content, "hi");
    }
}
