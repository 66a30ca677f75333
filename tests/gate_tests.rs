//! Integration tests for satisfaction snapshots and convergence.

mod common;

use agora::research::{MemoryEntry, ResearchSession};
use agora::types::{AgentId, ConfigurationError, ResearchError, WarningKind};
use common::mocks::{fast_settings, session_with, tagged, CallKind, MockLLMClient, MockSearchTool};
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn test_two_agents_reach_convergence_after_one_brainstorm() {
    let llm = MockLLMClient::new("1. an idea").on(CallKind::Rating, "8");
    let search = MockSearchTool::empty();
    let session = session_with(&llm, &search, &["Alpha", "Beta"], "X");

    let round = session.brainstorm().await.unwrap();
    assert_eq!(round.value.entries_appended(), 2);
    assert_eq!(session.round_counter(), 1);

    let report = session.collect_snapshot().await.unwrap();
    let verdict = report.value;

    assert!(report.warnings.is_empty());
    assert_eq!(verdict.snapshot.after_round, 1);
    assert_eq!(verdict.mean, Some(8.0));
    assert_eq!(verdict.threshold, 8.0);
    assert!(verdict.converged);
    assert!(!verdict.cancelled);
    assert_eq!(verdict.snapshot.rating_for(&AgentId::new("alpha")), Some(8));

    assert_eq!(session.snapshots().len(), 1);
    let latest = session.latest_snapshot().unwrap();
    assert!(session.is_converged(&latest));

    let alpha = session.agent(&AgentId::new("alpha")).unwrap();
    assert!(matches!(
        alpha.memory().last().map(|m| &m.entry),
        Some(MemoryEntry::SatisfactionRating(8))
    ));
}

#[tokio::test]
async fn test_one_unparseable_rating_of_three_still_converges() {
    let llm = MockLLMClient::new("1. an idea")
        .on(CallKind::Rating, "9")
        .on_agent("Gamma", CallKind::Rating, "I would rather not say.");
    let search = MockSearchTool::empty();
    let session = session_with(&llm, &search, &["Alpha", "Beta", "Gamma"], "Topic");
    session.brainstorm().await.unwrap();

    let report = session.collect_snapshot().await.unwrap();

    assert!(report.value.converged);
    assert_eq!(report.value.mean, Some(9.0));
    assert_eq!(report.value.snapshot.skipped, vec![AgentId::new("gamma")]);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].kind, WarningKind::SkippedRating);

    let gamma = session.agent(&AgentId::new("gamma")).unwrap();
    assert!(!gamma
        .memory()
        .iter()
        .any(|m| matches!(m.entry, MemoryEntry::SatisfactionRating(_))));
}

#[tokio::test]
async fn test_all_ratings_skipped_never_converges() {
    let llm = MockLLMClient::new("1. an idea").on(CallKind::Rating, "no number here");
    let search = MockSearchTool::empty();
    let session = session_with(&llm, &search, &["Alpha", "Beta", "Gamma"], "Topic");
    session.brainstorm().await.unwrap();

    let report = session.collect_snapshot().await.unwrap();

    assert_eq!(report.value.mean, None);
    assert!(!report.value.converged);
    assert_eq!(report.value.snapshot.polled(), 3);
    assert_eq!(report.warnings.len(), 3);
}

#[rstest]
#[case("7", "8", 8.0, false)]
#[case("8", "8", 8.0, true)]
#[case("10", "6", 8.0, true)]
#[case("Rating: 9/10", "9", 9.0, true)]
#[case("3", "4", 3.5, true)]
#[tokio::test]
async fn test_threshold_decides_convergence(
    #[case] alpha: &str,
    #[case] beta: &str,
    #[case] threshold: f64,
    #[case] converged: bool,
) {
    let llm = MockLLMClient::new("1. an idea")
        .on_agent("Alpha", CallKind::Rating, alpha)
        .on_agent("Beta", CallKind::Rating, beta);
    let mut settings = fast_settings();
    settings.satisfaction_threshold = threshold;
    let session = ResearchSession::new(Arc::new(llm), Arc::new(MockSearchTool::empty()), settings);
    session.add_agent(tagged("Alpha", "x")).unwrap();
    session.add_agent(tagged("Beta", "y")).unwrap();
    session.set_topic("Topic").unwrap();
    session.brainstorm().await.unwrap();

    let verdict = session.collect_snapshot().await.unwrap().value;

    assert_eq!(verdict.converged, converged);
}

#[tokio::test]
async fn test_out_of_range_rating_is_skipped() {
    let llm = MockLLMClient::new("1. an idea")
        .on_agent("Alpha", CallKind::Rating, "11")
        .on_agent("Beta", CallKind::Rating, "0");
    let search = MockSearchTool::empty();
    let session = session_with(&llm, &search, &["Alpha", "Beta"], "Topic");
    session.brainstorm().await.unwrap();

    let report = session.collect_snapshot().await.unwrap();

    assert!(report.value.snapshot.ratings.is_empty());
    assert_eq!(report.warnings.len(), 2);
    assert!(report.warnings[0].message.contains("[1, 10]"));
}

#[tokio::test]
async fn test_restated_scale_is_not_read_as_a_rating() {
    let llm = MockLLMClient::new("1. an idea")
        .on_agent("Alpha", CallKind::Rating, "On a scale of 1 to 10, I would give it an 8.")
        .on_agent("Beta", CallKind::Rating, "Rating (1-10): hard to say yet");
    let search = MockSearchTool::empty();
    let session = session_with(&llm, &search, &["Alpha", "Beta"], "Topic");
    session.brainstorm().await.unwrap();

    let report = session.collect_snapshot().await.unwrap();
    let snapshot = &report.value.snapshot;

    assert_eq!(snapshot.rating_for(&AgentId::new("alpha")), Some(8));
    assert_eq!(snapshot.rating_for(&AgentId::new("beta")), None);
    assert_eq!(snapshot.skipped, vec![AgentId::new("beta")]);
    assert_eq!(report.value.mean, Some(8.0));
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].kind, WarningKind::SkippedRating);

    let beta = session.agent(&AgentId::new("beta")).unwrap();
    assert!(!beta
        .memory()
        .iter()
        .any(|m| matches!(m.entry, MemoryEntry::SatisfactionRating(_))));
}

#[tokio::test]
async fn test_failed_rating_call_is_skipped() {
    let llm = MockLLMClient::new("1. an idea")
        .on(CallKind::Rating, "9")
        .fail_agent("Beta");
    let search = MockSearchTool::empty();
    let session = session_with(&llm, &search, &["Alpha", "Beta"], "Topic");
    session.brainstorm().await.unwrap();

    let report = session.collect_snapshot().await.unwrap();

    assert_eq!(report.value.snapshot.ratings, vec![(AgentId::new("alpha"), 9)]);
    assert!(report.warnings[0].message.contains("rating call failed"));
}

#[tokio::test]
async fn test_rating_prompt_carries_the_artifact() {
    let llm = MockLLMClient::new("1. Sparse mixture of experts").on(CallKind::Rating, "7");
    let search = MockSearchTool::empty();
    let session = session_with(&llm, &search, &["Alpha"], "Routing");
    session.brainstorm().await.unwrap();

    session.collect_snapshot().await.unwrap();

    let prompt = &llm.calls_of(CallKind::Rating)[0].prompt;
    assert!(prompt.contains("Evaluate the research progress on: Routing"));
    assert!(prompt.contains("round 1 idea from alpha: Sparse mixture of experts"));
}

#[tokio::test]
async fn test_snapshot_preconditions() {
    let llm = MockLLMClient::new("8");
    let search = MockSearchTool::empty();

    let session = ResearchSession::new(Arc::new(llm.clone()), Arc::new(search.clone()), fast_settings());
    session.add_agent(tagged("Alpha", "x")).unwrap();
    let err = session.collect_snapshot().await.unwrap_err();
    assert!(matches!(
        err,
        ResearchError::Configuration(ConfigurationError::NoTopicSet)
    ));

    session.set_topic("Topic").unwrap();
    let err = session.collect_snapshot().await.unwrap_err();
    assert!(matches!(
        err,
        ResearchError::Configuration(ConfigurationError::NoArtifactEntries)
    ));

    let empty = ResearchSession::new(Arc::new(llm.clone()), Arc::new(search), fast_settings());
    empty.set_topic("Topic").unwrap();
    let err = empty.collect_snapshot().await.unwrap_err();
    assert!(matches!(
        err,
        ResearchError::Configuration(ConfigurationError::EmptyRoster)
    ));

    assert_eq!(llm.call_count(), 0);
    assert!(session.snapshots().is_empty());
}

#[tokio::test]
async fn test_snapshot_does_not_advance_the_round_counter() {
    let llm = MockLLMClient::new("1. an idea").on(CallKind::Rating, "5");
    let search = MockSearchTool::empty();
    let session = session_with(&llm, &search, &["Alpha"], "Topic");
    session.brainstorm().await.unwrap();

    session.collect_snapshot().await.unwrap();
    session.collect_snapshot().await.unwrap();

    assert_eq!(session.round_counter(), 1);
    let snapshots = session.snapshots();
    assert_eq!(snapshots.len(), 2);
    assert!(snapshots.iter().all(|s| s.after_round == 1));
}

#[tokio::test]
async fn test_cancelled_snapshot_counts_missing_agents_as_skipped() {
    let llm = MockLLMClient::new("1. an idea")
        .on(CallKind::Rating, "9")
        .hang_agent("Beta");
    let search = MockSearchTool::empty();
    let session = session_with(&llm, &search, &["Alpha", "Beta", "Gamma"], "Topic");
    // Beta hangs on every call; stop the brainstorm once Alpha has contributed.
    let cancel_round = CancellationToken::new();
    let trigger = cancel_round.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });
    session
        .run_round_with_cancel(agora::RoundVariant::Brainstorm, &cancel_round)
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });
    let report = session.collect_snapshot_with_cancel(&cancel).await.unwrap();

    let verdict = report.value;
    assert!(verdict.cancelled);
    assert_eq!(verdict.snapshot.ratings, vec![(AgentId::new("alpha"), 9)]);
    assert_eq!(
        verdict.snapshot.skipped,
        vec![AgentId::new("beta"), AgentId::new("gamma")]
    );
    assert!(verdict.converged);
    assert_eq!(report.warnings.len(), 2);
    assert!(report
        .warnings
        .iter()
        .all(|w| w.kind == WarningKind::SkippedRating));
}
