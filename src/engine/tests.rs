use super::*;
use crate::config::test_config;
use crate::llm::mock::ScriptedBackend;
use crate::llm::{BackendError, ModelGateway};
use crate::personalities::FARM_ADVISOR;
use crate::preprocessing::EnvironmentContext;
use crate::protocol::Classification;
use crate::transcript::{Entry, Role, Turn};
use serde_json::json;
use std::sync::Arc;

const GEN_REPLY: &str = "<r>Sure thing! Preparing that corn timeline...</r>\
    <gr>Received location, date and NPK. Requesting data generation.</gr>\
    <gen>Corn|timeline|Ames, Iowa|2024-05-15|N:115,P:35,K:190</gen><cls>MF</cls>";

fn orchestrator(backend: &Arc<ScriptedBackend>) -> ChatOrchestrator {
    ChatOrchestrator::new(ModelGateway::new(backend.clone()), Arc::new(test_config()))
}

fn turn(message: &str, history: Vec<Turn>) -> ChatTurn {
    ChatTurn {
        message: message.to_string(),
        history: history.into_iter().map(Entry::from).collect(),
        use_paid_tier: false,
        context: EnvironmentContext {
            location: Some("Ames, Iowa".into()),
            npk: Some("N:115,P:35,K:190".into()),
            date: Some("2024-05-15".into()),
        },
    }
}

fn text(turn: &Turn) -> &str {
    turn.parts[0].as_text().unwrap()
}

fn entry_text(entry: &Entry) -> &str {
    text(entry.as_turn().unwrap())
}

fn entries(turns: impl IntoIterator<Item = Turn>) -> Vec<Entry> {
    turns.into_iter().map(Entry::from).collect()
}

#[tokio::test]
async fn plain_reply_appends_one_model_turn() {
    let reply = "<r>Plant **yams** this month.</r><gr>Noted.</gr><cls>MF</cls>";
    let backend = Arc::new(ScriptedBackend::with_replies([reply]));
    let history = vec![Turn::user("Hello"), Turn::model("<r>Hi!</r>")];

    let outcome = orchestrator(&backend)
        .respond(turn("What should I plant?", history.clone()))
        .await
        .unwrap();

    assert_eq!(outcome.response, "Plant **yams** this month.");
    assert_eq!(outcome.classification, Some(Classification::MF));
    assert_eq!(outcome.visuals, None);
    assert_eq!(outcome.visuals_usage, None);
    assert_eq!(outcome.phase, ResolutionPhase::Normal);

    let mut expected = entries(history);
    expected.push(Turn::user("What should I plant?").into());
    expected.push(Turn::model(reply).into());
    assert_eq!(outcome.history, expected);
}

#[tokio::test]
async fn outbound_transcript_is_primed_and_tagged_but_history_is_not() {
    let backend = Arc::new(ScriptedBackend::with_replies(["<r>ok</r>"]));
    let outcome = orchestrator(&backend)
        .respond(turn("Hi", Vec::new()))
        .await
        .unwrap();

    let sent = &backend.calls()[0];
    assert_eq!(&sent[..2], &FARM_ADVISOR.turns());
    assert_eq!(
        text(&sent[2]),
        "<p>Hi</p><g>System Context: Location: Ames, Iowa, NPK Reading: N:115,P:35,K:190, \
         Current Date: 2024-05-15</g><g>Classify the overall chat direction at this point (FI/MF/GT).</g>"
    );

    assert_eq!(outcome.history[0], Entry::from(Turn::user("Hi")));
    assert_eq!(backend.models(), ["free-model"]);
}

#[tokio::test]
async fn paid_tier_uses_paid_model() {
    let backend = Arc::new(ScriptedBackend::with_replies(["<r>ok</r>"]));
    let mut request = turn("Hi", Vec::new());
    request.use_paid_tier = true;

    orchestrator(&backend).respond(request).await.unwrap();
    assert_eq!(backend.models(), ["paid-model"]);
}

#[tokio::test]
async fn missing_reply_tag_falls_back() {
    let backend = Arc::new(ScriptedBackend::with_replies(["no tags at all"]));
    let outcome = orchestrator(&backend)
        .respond(turn("Hi", Vec::new()))
        .await
        .unwrap();

    assert_eq!(outcome.response, MISSING_REPLY);
    assert_eq!(outcome.classification, None);
    assert_eq!(
        outcome.history.last().and_then(Entry::as_turn),
        Some(&Turn::model("no tags at all"))
    );
}

#[tokio::test]
async fn successful_generation_appends_three_turns_and_visuals() {
    let backend = Arc::new(ScriptedBackend::with_replies([
        GEN_REPLY,
        r#"<data>{"query": {"cropName": "Corn"}, "timeline": {"stages": []}}</data>"#,
    ]));
    let history = vec![Turn::user("Hello"), Turn::model("<r>Hi!</r>")];

    let outcome = orchestrator(&backend)
        .respond(turn("Show me a corn timeline", history))
        .await
        .unwrap();

    assert_eq!(outcome.response, "Sure thing! Preparing that corn timeline...");
    assert_eq!(outcome.phase, ResolutionPhase::SuccessAnnounced);
    assert_eq!(
        outcome.visuals.map(serde_json::Value::Object),
        Some(json!({"query": {"cropName": "Corn"}, "timeline": {"stages": []}}))
    );
    assert!(outcome.visuals_usage.is_some());

    // 2 prior + new user turn + model ack + notice pair
    assert_eq!(outcome.history.len(), 6);
    assert_eq!(outcome.history[3], Entry::from(Turn::model(GEN_REPLY)));
    assert_eq!(outcome.history[4..], entries(Announcement::Success.turns())[..]);
    assert_eq!(outcome.history[4].as_turn().unwrap().role, Role::User);
    assert!(entry_text(&outcome.history[4]).starts_with("<g>"));
    assert!(entry_text(&outcome.history[5]).starts_with("<gr>"));

    assert_eq!(backend.models(), ["free-model", "accessory-model"]);
}

#[tokio::test]
async fn malformed_directive_announces_failure_without_detail() {
    let reply = "<r>On it.</r><gen>Corn|timeline|Ames</gen>";
    let backend = Arc::new(ScriptedBackend::with_replies([reply]));

    let outcome = orchestrator(&backend)
        .respond(turn("timeline please", Vec::new()))
        .await
        .unwrap();

    assert_eq!(outcome.phase, ResolutionPhase::FailureAnnounced);
    assert_eq!(outcome.visuals, None);
    assert_eq!(outcome.history.len(), 4);
    assert_eq!(
        outcome.history[2..],
        entries(Announcement::Failure { detail: None }.turns())[..]
    );
    assert!(!entry_text(&outcome.history[2]).contains("fields"));
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn nested_backend_failure_is_announced_with_generic_detail() {
    let backend = Arc::new(ScriptedBackend::with_replies([GEN_REPLY]));
    backend.push_failure(BackendError::Status {
        status: 500,
        message: "internal stack trace".into(),
    });

    let outcome = orchestrator(&backend)
        .respond(turn("timeline please", Vec::new()))
        .await
        .unwrap();

    assert_eq!(outcome.phase, ResolutionPhase::FailureAnnounced);
    let notice = entry_text(&outcome.history[2]);
    assert!(notice.contains("AI service encountered an unexpected error"));
    assert!(!notice.contains("internal stack trace"));
    assert_eq!(outcome.response, "Sure thing! Preparing that corn timeline...");
}

#[tokio::test]
async fn only_first_directive_is_resolved() {
    let reply = format!("{GEN_REPLY}<gen>Wheat|timeline|N/A|2024-06-01|N/A</gen>");
    let backend = Arc::new(ScriptedBackend::with_replies([
        reply.as_str(),
        "<data>{\"query\": {\"cropName\": \"Corn\"}}</data>",
    ]));

    let outcome = orchestrator(&backend)
        .respond(turn("timeline please", Vec::new()))
        .await
        .unwrap();

    assert_eq!(outcome.phase, ResolutionPhase::SuccessAnnounced);
    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    assert!(text(calls[1].last().unwrap()).contains("Crop Name: Corn"));
}

#[tokio::test]
async fn primary_call_failure_is_an_error() {
    let backend = Arc::new(ScriptedBackend::new());
    backend.push_failure(BackendError::Transport("offline".into()));

    let err = orchestrator(&backend)
        .respond(turn("Hi", Vec::new()))
        .await
        .unwrap_err();
    assert_eq!(err, ChatError::Gateway(crate::llm::GatewayError::Unavailable));
}

#[tokio::test]
async fn unrecognized_history_items_are_returned_but_not_sent() {
    let backend = Arc::new(ScriptedBackend::with_replies(["<r>ok</r>"]));
    let system = json!({"role": "system", "parts": ["be terse"]});
    let mut request = turn("next", vec![Turn::user("hi")]);
    request.history.push(Entry::Unrecognized(system.clone()));
    request.history.push(Turn::model("<r>hello</r>").into());

    let outcome = orchestrator(&backend).respond(request).await.unwrap();

    assert_eq!(outcome.history.len(), 5);
    assert_eq!(outcome.history[1], Entry::Unrecognized(system));
    assert_eq!(outcome.history[3], Entry::from(Turn::user("next")));

    let sent = &backend.calls()[0];
    assert_eq!(sent.len(), 2 + 3);
    assert_eq!(sent[2], Turn::user("hi"));
    assert_eq!(sent[3], Turn::model("<r>hello</r>"));
    assert!(text(&sent[4]).starts_with("<p>next</p>"));
}
