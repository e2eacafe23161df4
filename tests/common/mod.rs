//! 集成测试共用的脚本化模型与组装函数

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kids_progress::clients::{ChatMessage, ChatModel, OutputSchema};
use kids_progress::error::ModelError;
use kids_progress::models::RubricCriterion;
use kids_progress::services::ModelGateway;
use kids_progress::storage::{DocumentStore, MemoryStore, RubricRepository};
use kids_progress::Supervisor;
use serde_json::{json, Value as JsonValue};

/// 按顺序返回预设回复的模型
///
/// - 文本回复用完后返回 `Invocation` 错误
/// - 结构化回复为空时返回 `StructuredUnsupported`，调用方退回文本路径
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    structured: Mutex<VecDeque<JsonValue>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
    structured_calls: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let model = Self::new();
        for reply in replies {
            model.push_reply(reply);
        }
        model
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Ok(reply.into()));
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        self.replies.lock().unwrap().push_back(Err(message.into()));
    }

    pub fn push_structured(&self, value: JsonValue) {
        self.structured.lock().unwrap().push_back(value);
    }

    /// 文本调用记录
    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// 结构化调用的 schema 名称
    pub fn structured_calls(&self) -> Vec<String> {
        self.structured_calls.lock().unwrap().clone()
    }

    pub fn pending_replies(&self) -> usize {
        self.replies.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn invoke(&self, messages: &[ChatMessage]) -> Result<String, ModelError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(ModelError::Invocation {
                model: "scripted".to_string(),
                message,
            }),
            None => Err(ModelError::Invocation {
                model: "scripted".to_string(),
                message: "no scripted reply left".to_string(),
            }),
        }
    }

    async fn invoke_structured(
        &self,
        _messages: &[ChatMessage],
        schema: &OutputSchema,
    ) -> Result<JsonValue, ModelError> {
        self.structured_calls
            .lock()
            .unwrap()
            .push(schema.name.to_string());
        match self.structured.lock().unwrap().pop_front() {
            Some(value) => Ok(value),
            None => Err(ModelError::StructuredUnsupported {
                model: "scripted".to_string(),
            }),
        }
    }
}

pub fn gateway(model: Arc<ScriptedModel>) -> ModelGateway {
    ModelGateway::new(model, Duration::from_secs(5))
}

pub fn sample_rubric() -> Vec<RubricCriterion> {
    [
        ("Content and Ideas", "Clarity of main idea"),
        ("Content and Ideas", "Use of details"),
        ("Language Use", "Vocabulary"),
        ("Language Use", "Sentence variety"),
    ]
    .into_iter()
    .map(|(dimension, criterion)| RubricCriterion {
        dimension: dimension.to_string(),
        criterion: criterion.to_string(),
    })
    .collect()
}

/// 写入评分标准的内存存储
pub async fn seeded_store() -> Arc<dyn DocumentStore> {
    let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
    RubricRepository::new(Arc::clone(&store))
        .seed_if_empty(&sample_rubric())
        .await
        .unwrap();
    store
}

pub async fn supervisor_with(model: Arc<ScriptedModel>) -> (Supervisor, Arc<dyn DocumentStore>) {
    let store = seeded_store().await;
    (Supervisor::new(gateway(model), Arc::clone(&store)), store)
}

pub fn genre_subjects() -> JsonValue {
    json!({"genre": "Story", "subjects": ["dogs", "friendship"]})
}

pub fn evaluation(overall: i64, vocabulary: i64) -> JsonValue {
    json!({
        "overall_score": overall,
        "rubric_scores": [
            {
                "dimension": "Content and Ideas",
                "criteria": [
                    {"criterion": "Clarity of main idea", "score": 8, "reason": "Clear story."}
                ]
            },
            {
                "dimension": "Language Use",
                "criteria": [
                    {"criterion": "Vocabulary", "score": vocabulary, "reason": "Simple words."}
                ]
            }
        ],
        "feedback_student": "Great job telling your story!",
        "feedback_parent": "Your child writes clear stories.",
        "improved_text": "My dog Max is my best friend."
    })
}

pub fn writing_payload() -> JsonValue {
    json!({"title": "My Dog", "text": "My dog is Max. He is my friend."})
}
