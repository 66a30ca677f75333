//! Integration tests for saving and restoring sessions.

mod common;

use agora::research::{load_session, save_session, SessionState};
use agora::types::{AgentId, ResearchError};
use common::mocks::{fast_settings, hit, session_with, CallKind, MockLLMClient, MockSearchTool};
use std::sync::Arc;
use tempfile::TempDir;

fn scripted() -> MockLLMClient {
    MockLLMClient::new("1. an idea")
        .on(CallKind::Research, "a note")
        .on(CallKind::Discussion, "a view")
        .on(CallKind::Rating, "7")
        .on_agent(
            "Alpha",
            CallKind::Mutation,
            "[agent:Alpha] You are Alpha. Prefer primary sources.",
        )
}

#[tokio::test]
async fn test_round_trip_preserves_session_state() {
    let llm = scripted();
    let search = MockSearchTool::new(vec![hit("Paper", "https://example.org/paper")]);
    let session = session_with(&llm, &search, &["Alpha", "Beta"], "Topic");
    session.brainstorm().await.unwrap();
    session.research().await.unwrap();
    session.discuss("scope").await.unwrap();
    session.collect_snapshot().await.unwrap();
    session.improve_agent(&AgentId::new("alpha")).await.unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");
    save_session(&session, &path).await.unwrap();
    assert!(path.exists());
    assert!(!dir.path().join("session.json.tmp").exists());

    let restored = load_session(&path, Arc::new(llm.clone()), Arc::new(search.clone()), fast_settings())
        .await
        .unwrap();

    let before = session.export_state();
    let after = restored.export_state();
    assert_eq!(after.id, before.id);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(after.topic, before.topic);
    assert_eq!(after.round_counter, 3);
    assert_eq!(after.agents, before.agents);
    assert_eq!(after.artifact, before.artifact);
    assert_eq!(after.snapshots, before.snapshots);

    // The restored session carries on numbering rounds.
    let report = restored.brainstorm().await.unwrap();
    assert_eq!(report.value.round, 4);
    assert_eq!(restored.artifact().len(), session.artifact().len() + 2);
}

#[tokio::test]
async fn test_archived_cycles_survive_a_round_trip() {
    let llm = scripted();
    let search = MockSearchTool::empty();
    let session = session_with(&llm, &search, &["Alpha"], "First");
    session.brainstorm().await.unwrap();
    session.reset_topic("Second").unwrap();

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("state.json");
    save_session(&session, &path).await.unwrap();

    let restored = load_session(&path, Arc::new(llm), Arc::new(search), fast_settings())
        .await
        .unwrap();
    let cycles = restored.cycles();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].topic, "First");
    assert_eq!(cycles[0].artifact.len(), 1);
    assert_eq!(restored.topic().as_deref(), Some("Second"));
    assert!(restored.artifact().is_empty());
}

#[tokio::test]
async fn test_missing_file_is_a_persistence_error() {
    let dir = TempDir::new().unwrap();
    let result = load_session(
        dir.path().join("absent.json"),
        Arc::new(MockLLMClient::new("x")),
        Arc::new(MockSearchTool::empty()),
        fast_settings(),
    )
    .await;

    match result {
        Err(ResearchError::Persistence(message)) => assert!(message.contains("cannot read")),
        Err(other) => panic!("expected a persistence error, got {:?}", other),
        Ok(_) => panic!("loading a missing file should fail"),
    }
}

#[tokio::test]
async fn test_corrupt_file_is_a_persistence_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");
    tokio::fs::write(&path, "{ not json").await.unwrap();

    let result = load_session(
        &path,
        Arc::new(MockLLMClient::new("x")),
        Arc::new(MockSearchTool::empty()),
        fast_settings(),
    )
    .await;

    assert!(matches!(result, Err(ResearchError::Persistence(_))));
}

#[tokio::test]
async fn test_inconsistent_state_is_refused() {
    let llm = scripted();
    let search = MockSearchTool::empty();
    let session = session_with(&llm, &search, &["Alpha"], "Topic");
    session.brainstorm().await.unwrap();

    let mut state: SessionState = session.export_state();
    state.round_counter = 0;

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");
    tokio::fs::write(&path, state.to_json().unwrap()).await.unwrap();

    let result = load_session(&path, Arc::new(llm.clone()), Arc::new(search.clone()), fast_settings()).await;
    match result {
        Err(ResearchError::Persistence(message)) => assert!(message.contains("round counter")),
        Err(other) => panic!("expected a persistence error, got {:?}", other),
        Ok(_) => panic!("an artifact ahead of the round counter should be refused"),
    }

    // Ratings outside [1, 10] never come back, neither in memory nor in snapshots.
    session.collect_snapshot().await.unwrap();
    let mut remembered = serde_json::to_value(session.export_state()).unwrap();
    for record in remembered["agents"][0]["memory"].as_array_mut().unwrap() {
        if record["entry"]["kind"] == "satisfaction_rating" {
            record["entry"]["value"] = serde_json::json!(200);
        }
    }
    tokio::fs::write(&path, remembered.to_string()).await.unwrap();
    let result = load_session(&path, Arc::new(llm.clone()), Arc::new(search.clone()), fast_settings()).await;
    match result {
        Err(ResearchError::Persistence(message)) => assert!(message.contains("rating 200")),
        Err(other) => panic!("expected a persistence error, got {:?}", other),
        Ok(_) => panic!("a remembered rating of 200 should be refused"),
    }

    let mut state = session.export_state();
    state.snapshots[0].ratings[0].1 = 200;
    tokio::fs::write(&path, state.to_json().unwrap()).await.unwrap();
    let result = load_session(&path, Arc::new(llm), Arc::new(search), fast_settings()).await;
    match result {
        Err(ResearchError::Persistence(message)) => assert!(message.contains("rating 200")),
        Err(other) => panic!("expected a persistence error, got {:?}", other),
        Ok(_) => panic!("a snapshot rating of 200 should be refused"),
    }
}

#[tokio::test]
async fn test_save_overwrites_previous_state() {
    let llm = scripted();
    let search = MockSearchTool::empty();
    let session = session_with(&llm, &search, &["Alpha"], "Topic");

    let dir = TempDir::new().unwrap();
    let path = dir.path().join("session.json");
    save_session(&session, &path).await.unwrap();
    session.brainstorm().await.unwrap();
    save_session(&session, &path).await.unwrap();

    let json = tokio::fs::read_to_string(&path).await.unwrap();
    let state = SessionState::from_json(&json).unwrap();
    assert_eq!(state.round_counter, 1);
    assert_eq!(state.artifact.len(), 1);
}
