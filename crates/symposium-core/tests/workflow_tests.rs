use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use symposium_core::prelude::*;
use symposium_core::{StepCompletionPolicy, WorkflowEvent};
use symposium_test_utils::{
    character, chunk, chunk_with, citation, drain_events, panel_json, populated_store,
    research_text, setup_orchestrator, setup_orchestrator_with, CallKind, ScriptStep,
    ScriptedGenerator,
};

fn generator() -> Arc<ScriptedGenerator> {
    Arc::new(ScriptedGenerator::new())
}

#[tokio::test]
async fn full_pipeline_then_panel_edit_cascades() {
    let gen = generator();
    let mut orch = setup_orchestrator(gen.clone());

    orch.set_topic_text("Tidal power").await.unwrap();
    orch.confirm_topic().await.unwrap();
    assert_eq!(orch.state().current_step, Step::Research);

    let dup = Citation::new("Same source, other title", "https://example.org/1");
    gen.push_stream(vec![
        ScriptStep::Chunk(chunk_with(&research_text(30), vec![citation(1)])),
        ScriptStep::Chunk(chunk_with(&research_text(30), vec![dup])),
    ]);
    assert_eq!(orch.dispatch(StepAction::Research).await.unwrap(), Dispatch::Completed);
    assert_eq!(orch.state().research_data.chars().count(), 60);
    assert_eq!(orch.state().citations.len(), 1);
    assert_eq!(
        orch.state().citations.iter().next().unwrap().title,
        "Source 1"
    );

    assert_eq!(orch.proceed().unwrap(), Step::Panel);
    gen.push_structured(panel_json(6));
    assert_eq!(orch.dispatch(StepAction::GeneratePanel).await.unwrap(), Dispatch::Completed);
    assert_eq!(orch.state().characters.len(), 6);

    assert_eq!(orch.proceed().unwrap(), Step::Discussion);
    gen.push_chunks(&["Expert 1: tides are reliable.", "\nExpert 2: costs are high."]);
    assert_eq!(orch.dispatch(StepAction::StartDiscussion).await.unwrap(), Dispatch::Completed);

    assert_eq!(orch.proceed().unwrap(), Step::Article);
    gen.push_chunks(&["# Tidal power\n\n", "A balanced view."]);
    assert_eq!(orch.dispatch(StepAction::GenerateArticle).await.unwrap(), Dispatch::Completed);
    assert!(StepCompletionPolicy::is_complete(orch.state(), Step::Article));

    let removed = orch.remove_character(2).await.unwrap();
    assert_eq!(removed, character(3));

    let names: Vec<_> = orch.state().characters.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Expert 1", "Expert 2", "Expert 4", "Expert 5", "Expert 6"]
    );
    assert!(orch.state().transcript.is_empty());
    assert!(orch.state().final_article.is_empty());
    assert_eq!(orch.state().current_step, Step::Discussion);
    assert_eq!(orch.state().research_data.chars().count(), 60);
    assert_eq!(gen.call_count(), 4);
}

#[tokio::test]
async fn declined_rerun_changes_nothing() {
    let gen = generator();
    let mut orch = setup_orchestrator_with(gen.clone(), populated_store());
    let before = orch.state().clone();

    for action in [
        StepAction::Research,
        StepAction::GeneratePanel,
        StepAction::StartDiscussion,
        StepAction::GenerateArticle,
    ] {
        let Dispatch::ConfirmationRequired(pending) = orch.dispatch(action).await.unwrap() else {
            panic!("{action} should need confirmation");
        };
        assert_eq!(*pending.effect(), action);
        assert_eq!(orch.resolve(pending, false).await.unwrap(), Resolution::Declined);
    }

    assert_eq!(orch.state(), &before);
    assert_eq!(gen.call_count(), 0);
}

#[tokio::test]
async fn accepted_rerun_clears_downstream_first() {
    let gen = generator();
    let mut orch = setup_orchestrator_with(gen.clone(), populated_store());
    let research = orch.state().research_data.clone();

    let Dispatch::ConfirmationRequired(pending) =
        orch.dispatch(StepAction::GeneratePanel).await.unwrap()
    else {
        panic!("panel is complete");
    };
    assert!(pending.message().contains("step 3"));

    gen.push_structured(panel_json(2));
    assert_eq!(orch.resolve(pending, true).await.unwrap(), Resolution::Completed);

    assert_eq!(orch.state().characters.len(), 2);
    assert!(orch.state().transcript.is_empty());
    assert!(orch.state().final_article.is_empty());
    assert_eq!(orch.state().research_data, research);
}

#[tokio::test]
async fn failed_stream_keeps_partial_output() {
    let gen = generator();
    let mut store = populated_store();
    store.set_research_data(String::new());
    store.set_citations(Default::default());
    let mut orch = setup_orchestrator_with(gen.clone(), store);

    gen.push_stream(vec![
        ScriptStep::Chunk(chunk("Part one, ")),
        ScriptStep::Chunk(chunk_with("part two", vec![citation(9)])),
        ScriptStep::Fail(GenerationError::Transport("connection reset".to_string())),
    ]);
    let err = orch.dispatch(StepAction::Research).await.unwrap_err();

    assert_eq!(
        err,
        WorkflowError::GenerationFailed {
            step: Step::Research,
            message: "connection reset".to_string(),
        }
    );
    assert_eq!(orch.state().research_data, "Part one, part two");
    assert_eq!(orch.state().citations.len(), 1);
    assert!(!orch.state().is_loading(Step::Research));
    assert_eq!(orch.state().preparing_step, None);
    assert!(orch
        .state()
        .last_error
        .as_deref()
        .is_some_and(|msg| msg.contains("connection reset")));
}

#[tokio::test]
async fn quota_on_stream_open_is_classified() {
    let gen = generator();
    let mut store = populated_store();
    store.set_transcript(String::new());
    store.set_final_article(String::new());
    let mut orch = setup_orchestrator_with(gen.clone(), store);

    gen.push_stream_error(GenerationError::Status {
        status: 429,
        message: "RESOURCE_EXHAUSTED".to_string(),
    });
    let err = orch.dispatch(StepAction::StartDiscussion).await.unwrap_err();

    assert_eq!(err, WorkflowError::QuotaExceeded { step: Step::Discussion });
    assert!(err.is_retryable());
    assert!(!orch.state().any_loading());
}

#[tokio::test]
async fn malformed_panel_is_reported_and_leaves_panel_empty() {
    let gen = generator();
    let mut store = populated_store();
    store.invalidate_from(Step::Panel);
    let mut orch = setup_orchestrator_with(gen.clone(), store);

    gen.push_structured(json!({ "panel": "not an array" }));
    let err = orch.dispatch(StepAction::GeneratePanel).await.unwrap_err();

    assert!(matches!(err, WorkflowError::MalformedResponse { step: Step::Panel, .. }));
    assert!(orch.state().characters.is_empty());
    assert!(orch
        .state()
        .last_error
        .as_deref()
        .is_some_and(|msg| msg.contains("invalid format")));

    // the next attempt starts with a clean error slot
    gen.push_structured(panel_json(3));
    assert_eq!(orch.dispatch(StepAction::GeneratePanel).await.unwrap(), Dispatch::Completed);
    assert_eq!(orch.state().last_error, None);
    assert_eq!(orch.state().characters.len(), 3);
}

#[tokio::test]
async fn extend_requires_existing_transcript() {
    let gen = generator();
    let mut store = populated_store();
    store.invalidate_from(Step::Discussion);
    let mut orch = setup_orchestrator_with(gen.clone(), store);

    let err = orch.dispatch(StepAction::ExtendDiscussion).await.unwrap_err();
    assert_eq!(err, WorkflowError::EmptyTranscript);
    assert_eq!(gen.call_count(), 0);

    gen.push_chunks(&["Expert 1: opening."]);
    assert_eq!(orch.dispatch(StepAction::StartDiscussion).await.unwrap(), Dispatch::Completed);
    gen.push_chunks(&["Expert 2: ", "closing."]);
    assert_eq!(
        orch.dispatch(StepAction::ExtendDiscussion).await.unwrap(),
        Dispatch::Completed
    );

    assert_eq!(
        orch.state().transcript,
        "Expert 1: opening.\n\n---\n\nExpert 2: closing."
    );
    let request = gen.last_request().unwrap();
    assert!(request.system_instruction.is_some());
    assert!(request.prompt.contains("Expert 1: opening."));
}

#[tokio::test]
async fn supplement_appends_without_confirmation_or_cascade() {
    let gen = generator();
    let mut orch = setup_orchestrator_with(gen.clone(), populated_store());
    let original = orch.state().research_data.clone();

    assert_eq!(
        orch.dispatch(StepAction::SupplementResearch).await.unwrap_err(),
        WorkflowError::EmptyQuery
    );

    orch.set_supplemental_query("  turbine fouling ");
    gen.push_stream(vec![ScriptStep::Chunk(chunk_with(
        "Barnacles matter.",
        vec![citation(2), citation(3)],
    ))]);
    assert_eq!(
        orch.dispatch(StepAction::SupplementResearch).await.unwrap(),
        Dispatch::Completed
    );

    let expected = format!(
        "{original}\n\n---\n\n## Supplemental research: turbine fouling\n\nBarnacles matter."
    );
    assert_eq!(orch.state().research_data, expected);
    assert_eq!(orch.state().citations.len(), 3);
    assert!(orch.state().supplemental_query.is_empty());
    assert_eq!(orch.state().characters.len(), 3);
    assert!(!orch.state().transcript.is_empty());

    let calls = gen.calls();
    assert_eq!(calls[0].kind, CallKind::Stream);
    assert!(calls[0].request.web_search);
    assert!(calls[0].request.prompt.contains("turbine fouling"));
}

#[tokio::test]
async fn additive_streams_failing_at_open_leave_no_banner() {
    let gen = generator();
    let mut orch = setup_orchestrator_with(gen.clone(), populated_store());
    let research = orch.state().research_data.clone();
    let transcript = orch.state().transcript.clone();

    orch.set_supplemental_query("turbine fouling");
    gen.push_stream_error(GenerationError::Status {
        status: 429,
        message: "slow down".to_string(),
    });
    assert_eq!(
        orch.dispatch(StepAction::SupplementResearch).await.unwrap_err(),
        WorkflowError::QuotaExceeded { step: Step::Research }
    );
    assert_eq!(orch.state().research_data, research);
    assert_eq!(orch.state().supplemental_query, "turbine fouling");

    gen.push_chunks(&["Barnacles matter."]);
    assert_eq!(
        orch.dispatch(StepAction::SupplementResearch).await.unwrap(),
        Dispatch::Completed
    );
    let research_after = &orch.state().research_data;
    assert_eq!(research_after.matches("## Supplemental research").count(), 1);
    assert!(research_after.ends_with("turbine fouling\n\nBarnacles matter."));

    gen.push_stream_error(GenerationError::Transport("connection refused".to_string()));
    assert!(orch.dispatch(StepAction::ExtendDiscussion).await.is_err());
    assert_eq!(orch.state().transcript, transcript);
}

#[tokio::test]
async fn generation_never_advances_the_active_step() {
    let gen = generator();
    let mut orch = setup_orchestrator(gen.clone());

    gen.push_text("Urban beekeeping");
    assert_eq!(orch.dispatch(StepAction::GenerateTopic).await.unwrap(), Dispatch::Completed);
    assert_eq!(orch.state().current_step, Step::Topic);
    assert!(!orch.state().topic.confirmed);

    orch.confirm_topic().await.unwrap();
    gen.push_chunks(&[research_text(80).as_str()]);
    assert_eq!(orch.dispatch(StepAction::Research).await.unwrap(), Dispatch::Completed);
    assert_eq!(orch.state().current_step, Step::Research);
}

#[tokio::test]
async fn locked_steps_cannot_be_generated() {
    let gen = generator();
    let mut orch = setup_orchestrator(gen.clone());

    for action in [
        StepAction::Research,
        StepAction::GeneratePanel,
        StepAction::StartDiscussion,
        StepAction::GenerateArticle,
    ] {
        let err = orch.dispatch(action).await.unwrap_err();
        assert_eq!(err, WorkflowError::StepLocked(action.step()));
    }
    assert_eq!(gen.call_count(), 0);
    assert_eq!(orch.go_to_step(Step::Panel), Err(WorkflowError::StepLocked(Step::Panel)));
}

#[tokio::test]
async fn custom_prompt_is_rendered_and_recorded() {
    let gen = generator();
    let mut orch = setup_orchestrator(gen.clone());
    orch.set_topic_text("Deep sea vents").await.unwrap();
    orch.confirm_topic().await.unwrap();
    orch.set_prompt(PromptSlot::Research, "Dig into {{topic}}, cite {{missing}}")
        .await;

    gen.push_chunks(&[research_text(60).as_str()]);
    assert_eq!(orch.dispatch(StepAction::Research).await.unwrap(), Dispatch::Completed);

    let sent = gen.last_request().unwrap().prompt;
    assert_eq!(sent, "Dig into Deep sea vents, cite {{missing}}");
    assert_eq!(
        orch.state().prompts.last_resolved(PromptSlot::Research),
        Some(sent.as_str())
    );
}

#[tokio::test]
async fn stream_events_arrive_in_order() {
    let gen = generator();
    let mut store = populated_store();
    store.invalidate_from(Step::Article);
    let mut orch = setup_orchestrator_with(gen.clone(), store);
    let mut rx = orch.subscribe();

    gen.push_chunks(&["Intro. ", "Body."]);
    assert_eq!(orch.dispatch(StepAction::GenerateArticle).await.unwrap(), Dispatch::Completed);

    assert_eq!(
        drain_events(&mut rx),
        vec![
            WorkflowEvent::LoadingChanged { step: Step::Article, loading: true },
            WorkflowEvent::Preparing { step: Some(Step::Article) },
            WorkflowEvent::Preparing { step: None },
            WorkflowEvent::Chunk { step: Step::Article, text: "Intro. ".to_string() },
            WorkflowEvent::Chunk { step: Step::Article, text: "Body.".to_string() },
            WorkflowEvent::LoadingChanged { step: Step::Article, loading: false },
        ]
    );
    assert_eq!(orch.state().final_article, "Intro. Body.");
}

#[tokio::test]
async fn manual_character_validation() {
    let gen = generator();
    let mut orch = setup_orchestrator_with(gen, populated_store());

    let err = orch.add_character("Ada", " ", "Bridges").await.unwrap_err();
    assert_eq!(err, WorkflowError::InvalidCharacter("profession is required".to_string()));
    assert_eq!(orch.state().characters.len(), 3);
    assert!(!orch.state().transcript.is_empty());

    orch.add_character(" Ada ", "Engineer", "Bridges").await.unwrap();
    assert_eq!(orch.state().characters.len(), 4);
    assert_eq!(orch.state().characters[3].name, "Ada");
    assert!(orch.state().transcript.is_empty());
}

#[tokio::test]
async fn topic_reset_unlocks_editing_and_clears_everything_after() {
    let gen = generator();
    let mut orch = setup_orchestrator_with(gen, populated_store());

    assert_eq!(
        orch.set_topic_text("Wave power").await,
        Err(WorkflowError::TopicLocked)
    );
    orch.reset_topic().await;

    assert_eq!(orch.state().topic.text, "Tidal power");
    assert!(!orch.state().topic.confirmed);
    assert!(orch.state().research_data.is_empty());
    assert!(orch.state().citations.is_empty());
    assert!(orch.state().characters.is_empty());
    assert_eq!(orch.state().current_step, Step::Topic);
    orch.set_topic_text("Wave power").await.unwrap();
}
