mod common;

use std::sync::Arc;

use common::{seeded_store, ScriptedModel};
use kids_progress::models::loaders::parse_requests;
use kids_progress::orchestrator::{ProcessingStats, RequestStatus};
use kids_progress::storage::Collection;
use kids_progress::{App, Config};

fn sequential_config() -> Config {
    Config {
        max_concurrent_requests: 1,
        rubric_file: None,
        ..Config::default()
    }
}

#[tokio::test]
async fn test_process_all_keeps_input_order_and_counts() {
    let model = Arc::new(ScriptedModel::with_replies(["general", "Hi there!"]));
    let store = seeded_store().await;
    let app = App::build(sequential_config(), model, Arc::clone(&store))
        .await
        .unwrap();

    let requests = parse_requests(
        r#"{"turn_kind":"text","content":"Hello"}
not json

{"turn_kind":"form","form_kind":"drawing","payload":{}}
"#,
    );
    let records = app.process_all(requests).await.unwrap();

    let lines: Vec<usize> = records.iter().map(|r| r.line).collect();
    assert_eq!(lines, vec![1, 2, 4]);

    assert_eq!(records[0].status, RequestStatus::Success);
    let response = records[0].response.as_ref().unwrap();
    assert_eq!(response.ai_msg.content, "Hi there!");

    assert_eq!(records[1].status, RequestStatus::Rejected);
    assert!(records[1].error.is_some());
    assert_eq!(records[2].status, RequestStatus::Rejected);

    assert_eq!(
        ProcessingStats::from_records(&records),
        ProcessingStats {
            success: 1,
            rejected: 2,
            failed: 0
        }
    );
    assert_eq!(store.count(Collection::ConversationTurns).await.unwrap(), 2);
}

#[tokio::test]
async fn test_model_failure_is_counted_as_failed() {
    let model = Arc::new(ScriptedModel::new());
    model.push_failure("rate limited");
    let store = seeded_store().await;
    let app = App::build(sequential_config(), model, store).await.unwrap();

    let records = app
        .process_all(parse_requests(r#"{"turn_kind":"text","content":"Hello"}"#))
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, RequestStatus::Failed);
    assert!(records[0].error.as_ref().unwrap().contains("rate limited"));

    let json = serde_json::to_value(&records[0]).unwrap();
    assert_eq!(json["status"], "failed");
    assert!(json.get("response").is_none());
}
