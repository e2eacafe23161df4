mod common;

use std::sync::Arc;

use async_trait::async_trait;
use common::{
    evaluation, gateway, genre_subjects, seeded_store, supervisor_with, writing_payload,
    ScriptedModel,
};
use kids_progress::error::{AppError, RoutingError, StorageError, StorageResult};
use kids_progress::models::{ChatRequest, FormKind, Role, TurnKind};
use kids_progress::storage::{
    Collection, ConversationRepository, Document, DocumentStore, Filter, FindOptions,
};
use kids_progress::Supervisor;
use serde_json::{json, Value as JsonValue};
use tokio_test::{assert_err, assert_ok};

/// 批量写入总是失败的存储，其余操作交给内层存储
struct FailingBatchStore {
    inner: Arc<dyn DocumentStore>,
}

#[async_trait]
impl DocumentStore for FailingBatchStore {
    fn backend_name(&self) -> &'static str {
        "failing-batch"
    }

    async fn insert_one(&self, collection: Collection, body: JsonValue) -> StorageResult<String> {
        self.inner.insert_one(collection, body).await
    }

    async fn insert_many(
        &self,
        _collection: Collection,
        _bodies: Vec<JsonValue>,
    ) -> StorageResult<Vec<String>> {
        Err(StorageError::Task("disk full".to_string()))
    }

    async fn find(
        &self,
        collection: Collection,
        filter: Filter,
        options: FindOptions,
    ) -> StorageResult<Vec<Document>> {
        self.inner.find(collection, filter, options).await
    }

    async fn find_by_id(
        &self,
        collection: Collection,
        id: &str,
    ) -> StorageResult<Option<Document>> {
        self.inner.find_by_id(collection, id).await
    }

    async fn count(&self, collection: Collection) -> StorageResult<usize> {
        self.inner.count(collection).await
    }
}

#[tokio::test]
async fn test_writing_form_persists_artifact_and_exchange() {
    let model = Arc::new(ScriptedModel::new());
    model.push_structured(genre_subjects());
    model.push_structured(evaluation(8, 5));
    let (supervisor, store) = supervisor_with(Arc::clone(&model)).await;

    let request = ChatRequest::form(FormKind::Writing, writing_payload());
    let response = assert_ok!(supervisor.handle(request).await);

    let payload = response.ai_msg.payload.clone().unwrap();
    assert_eq!(payload["overallScore"], 8);
    assert_eq!(payload["feedback"], "Great job telling your story!");
    assert!(payload["writingId"].as_str().is_some());

    assert_eq!(response.ai_msg.role, Role::Assistant);
    assert_eq!(response.ai_msg.turn_kind, TurnKind::Form);
    assert_eq!(response.ai_msg.form_kind, Some(FormKind::Writing));
    assert_eq!(response.ai_msg.content, "");

    // 表单不走分类，也不需要文本调用
    assert_eq!(model.call_count(), 0);
    assert_eq!(
        model.structured_calls(),
        vec!["genre_subjects", "writing_evaluation"]
    );

    assert_eq!(store.count(Collection::Writings).await.unwrap(), 1);
    assert_eq!(store.count(Collection::ConversationTurns).await.unwrap(), 2);

    let turns = ConversationRepository::new(Arc::clone(&store))
        .recent(10)
        .await
        .unwrap();
    let ids: Vec<_> = turns.iter().filter_map(|t| t.id.clone()).collect();
    assert!(ids.contains(&response.user_msg_id));
    assert!(ids.contains(&response.ai_msg.id));
}

#[tokio::test]
async fn test_general_text_classifies_once_and_replies() {
    let model = Arc::new(ScriptedModel::with_replies([
        "general",
        "Hello! Dinosaurs were huge animals.",
    ]));
    let (supervisor, store) = supervisor_with(Arc::clone(&model)).await;

    let request = ChatRequest::text("Tell me about dinosaurs");
    let response = assert_ok!(supervisor.handle(request).await);

    assert_eq!(response.ai_msg.content, "Hello! Dinosaurs were huge animals.");
    assert_eq!(response.ai_msg.turn_kind, TurnKind::Text);
    assert!(response.ai_msg.payload.is_none());

    let calls = model.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[0][0].content.contains("Classify this user message"));
    assert!(calls[0][0].content.contains("Tell me about dinosaurs"));
    assert!(!calls[1][1].content.contains("Classify this user message"));

    assert_eq!(store.count(Collection::Writings).await.unwrap(), 0);
    assert_eq!(store.count(Collection::ConversationTurns).await.unwrap(), 2);
}

#[tokio::test]
async fn test_system_related_text_goes_to_analysis() {
    let model = Arc::new(ScriptedModel::with_replies([
        "SYSTEM_RELATED",
        "Macro Analysis",
        "You are doing great overall!",
    ]));
    let (supervisor, store) = supervisor_with(Arc::clone(&model)).await;

    let request = ChatRequest::text("How is my writing overall?");
    let response = assert_ok!(supervisor.handle(request).await);

    assert_eq!(response.ai_msg.content, "You are doing great overall!");
    assert_eq!(model.call_count(), 3);
    assert_eq!(model.pending_replies(), 0);
    assert_eq!(store.count(Collection::ConversationTurns).await.unwrap(), 2);
}

#[tokio::test]
async fn test_math_form_saves_problem() {
    let model = Arc::new(ScriptedModel::with_replies(["Well done, 3 + 4 is 7!"]));
    let (supervisor, store) = supervisor_with(Arc::clone(&model)).await;

    let request = ChatRequest::form(
        FormKind::Math,
        json!({
            "problem_text": "What is 3 + 4?",
            "correct_answer": "7",
            "student_answer": " 7 "
        }),
    );
    let response = assert_ok!(supervisor.handle(request).await);

    let payload = response.ai_msg.payload.unwrap();
    assert_eq!(payload["isCorrect"], true);
    assert_eq!(payload["correctAnswer"], "7");
    assert_eq!(payload["feedback"], "Well done, 3 + 4 is 7!");
    assert!(payload["mathId"].as_str().is_some());

    assert_eq!(store.count(Collection::MathProblems).await.unwrap(), 1);
    assert_eq!(store.count(Collection::ConversationTurns).await.unwrap(), 2);
}

#[tokio::test]
async fn test_unknown_form_kind_persists_nothing() {
    let model = Arc::new(ScriptedModel::new());
    let (supervisor, store) = supervisor_with(Arc::clone(&model)).await;

    let request = ChatRequest::form(FormKind::Unknown, json!({}));
    let err = assert_err!(supervisor.handle(request).await);

    assert!(matches!(
        err,
        AppError::Routing(RoutingError::UnknownFormKind { .. })
    ));
    assert!(err.is_client_error());
    assert_eq!(model.call_count(), 0);
    assert_eq!(store.count(Collection::ConversationTurns).await.unwrap(), 0);
}

#[tokio::test]
async fn test_form_without_kind_persists_nothing() {
    let model = Arc::new(ScriptedModel::new());
    let (supervisor, store) = supervisor_with(Arc::clone(&model)).await;

    let request: ChatRequest = serde_json::from_value(json!({
        "turn_kind": "form",
        "payload": {"title": "My Dog", "text": "My dog is Max."}
    }))
    .unwrap();
    assert!(request.form_kind.is_none());
    let err = assert_err!(supervisor.handle(request).await);

    assert!(matches!(
        err,
        AppError::Routing(RoutingError::UnknownFormKind { form_kind: None })
    ));
    assert!(err.is_client_error());
    assert_eq!(model.call_count(), 0);
    assert!(model.structured_calls().is_empty());
    assert_eq!(store.count(Collection::ConversationTurns).await.unwrap(), 0);
}

#[tokio::test]
async fn test_unknown_turn_kind_persists_nothing() {
    let model = Arc::new(ScriptedModel::new());
    let (supervisor, store) = supervisor_with(Arc::clone(&model)).await;

    let request: ChatRequest =
        serde_json::from_value(json!({"turn_kind": "voice", "content": "hi"})).unwrap();
    let err = assert_err!(supervisor.handle(request).await);

    assert!(matches!(
        err,
        AppError::Routing(RoutingError::UnsupportedTurnKind { .. })
    ));
    assert_eq!(model.call_count(), 0);
    assert_eq!(store.count(Collection::ConversationTurns).await.unwrap(), 0);
}

#[tokio::test]
async fn test_classifier_failure_fails_request() {
    let model = Arc::new(ScriptedModel::new());
    model.push_failure("service unavailable");
    let (supervisor, store) = supervisor_with(Arc::clone(&model)).await;

    let err = assert_err!(supervisor.handle(ChatRequest::text("Hello")).await);

    assert!(matches!(err, AppError::Model(_)));
    assert!(!err.is_client_error());
    assert_eq!(model.call_count(), 1);
    assert_eq!(store.count(Collection::ConversationTurns).await.unwrap(), 0);
}

#[tokio::test]
async fn test_writing_without_text_fails_before_model_call() {
    let model = Arc::new(ScriptedModel::new());
    let (supervisor, store) = supervisor_with(Arc::clone(&model)).await;

    let request = ChatRequest::form(FormKind::Writing, json!({"title": "Empty"}));
    let err = assert_err!(supervisor.handle(request).await);

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(model.call_count(), 0);
    assert!(model.structured_calls().is_empty());
    assert_eq!(store.count(Collection::ConversationTurns).await.unwrap(), 0);
}

#[tokio::test]
async fn test_failed_commit_returns_error_and_stores_no_turns() {
    let model = Arc::new(ScriptedModel::with_replies(["general", "Hi there!"]));
    let inner = seeded_store().await;
    let store: Arc<dyn DocumentStore> = Arc::new(FailingBatchStore {
        inner: Arc::clone(&inner),
    });
    let supervisor = Supervisor::new(gateway(Arc::clone(&model)), store);

    let err = assert_err!(supervisor.handle(ChatRequest::text("Hello")).await);

    assert!(matches!(err, AppError::Storage(StorageError::Task(_))));
    assert!(!err.is_client_error());
    assert_eq!(model.call_count(), 2);
    assert_eq!(inner.count(Collection::ConversationTurns).await.unwrap(), 0);
}
