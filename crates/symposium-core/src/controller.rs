//! Orchestration controller
//!
//! Binds user actions to generation calls:
//! - Gates reruns of completed steps behind a [`Confirmation`]
//! - Cascades invalidation before a confirmed rerun
//! - Wraps single-shot and streamed calls in a uniform loading/error contract
//! - Feeds streamed fragments through [`StreamAggregator`] into the store
//! - Snapshots the durable state after each action
//!
//! The controller never advances the active step after a generation; only
//! [`Orchestrator::proceed`], [`Orchestrator::go_to_step`] and topic
//! confirmation move it.

use crate::citation::CitationSet;
use crate::completion::StepCompletionPolicy;
use crate::config::WorkflowConfig;
use crate::confirm::Confirmation;
use crate::error::{GenerationError, WorkflowError};
use crate::generator::{panel_schema, parse_panel, GenerationRequest, Generator};
use crate::persistence::{load_snapshot, save_snapshot, SnapshotStore};
use crate::prompts::{render, PromptSlot, PromptVars};
use crate::state::{WorkflowEvent, WorkflowState, WorkflowStore};
use crate::stream::{StreamAggregator, StreamChunk, StreamSink, StreamSummary};
use crate::types::{Character, Step};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Generation actions, one per step call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepAction {
    /// Suggest a topic (single-shot)
    GenerateTopic,
    /// Initial research (streamed, grounded)
    Research,
    /// Follow-up research on the stored query (streamed, additive)
    SupplementResearch,
    /// Expert panel (single-shot, structured)
    GeneratePanel,
    /// First discussion rounds (streamed)
    StartDiscussion,
    /// Further discussion rounds (streamed, additive)
    ExtendDiscussion,
    /// Article synthesis (streamed)
    GenerateArticle,
}

impl StepAction {
    /// Step the action writes to
    #[must_use]
    pub fn step(self) -> Step {
        match self {
            StepAction::GenerateTopic => Step::Topic,
            StepAction::Research | StepAction::SupplementResearch => Step::Research,
            StepAction::GeneratePanel => Step::Panel,
            StepAction::StartDiscussion | StepAction::ExtendDiscussion => Step::Discussion,
            StepAction::GenerateArticle => Step::Article,
        }
    }

    /// Whether running the action replaces the step's content
    ///
    /// Additive actions append to existing content and are never gated.
    #[must_use]
    pub fn is_destructive(self) -> bool {
        !matches!(
            self,
            StepAction::SupplementResearch | StepAction::ExtendDiscussion
        )
    }

    /// Whether output arrives as a fragment stream
    #[must_use]
    pub fn is_streaming(self) -> bool {
        !matches!(self, StepAction::GenerateTopic | StepAction::GeneratePanel)
    }
}

impl std::fmt::Display for StepAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StepAction::GenerateTopic => "generate-topic",
            StepAction::Research => "research",
            StepAction::SupplementResearch => "supplement-research",
            StepAction::GeneratePanel => "generate-panel",
            StepAction::StartDiscussion => "start-discussion",
            StepAction::ExtendDiscussion => "extend-discussion",
            StepAction::GenerateArticle => "generate-article",
        };
        f.write_str(name)
    }
}

/// Outcome of [`Orchestrator::dispatch`]
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Dispatch {
    /// The call ran to completion
    Completed,
    /// The step already has content; nothing ran and nothing changed
    ConfirmationRequired(Confirmation<StepAction>),
}

/// Outcome of [`Orchestrator::resolve`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Downstream cleared and the call ran
    Completed,
    /// Declined; state untouched
    Declined,
}

/// Where streamed fragments land
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StreamTarget {
    Research,
    Supplement,
    Discussion,
    Extension,
    Article,
}

impl StreamTarget {
    fn step(self) -> Step {
        match self {
            StreamTarget::Research | StreamTarget::Supplement => Step::Research,
            StreamTarget::Discussion | StreamTarget::Extension => Step::Discussion,
            StreamTarget::Article => Step::Article,
        }
    }

    fn collects_citations(self) -> bool {
        matches!(self, StreamTarget::Research | StreamTarget::Supplement)
    }
}

/// Mirrors aggregator callbacks onto the durable store
struct StoreSink<'a> {
    store: &'a mut WorkflowStore,
    target: StreamTarget,
    banner: String,
}

impl StoreSink<'_> {
    fn append(&mut self, text: &str) {
        match self.target {
            StreamTarget::Research | StreamTarget::Supplement => {
                self.store.update_research_data(|current| format!("{current}{text}"));
            }
            StreamTarget::Discussion | StreamTarget::Extension => {
                self.store.update_transcript(|current| format!("{current}{text}"));
            }
            StreamTarget::Article => {
                self.store.update_final_article(|current| format!("{current}{text}"));
            }
        }
    }
}

impl StreamSink for StoreSink<'_> {
    fn on_start(&mut self) {
        match self.target {
            StreamTarget::Research => self.store.set_research_data(String::new()),
            StreamTarget::Discussion => self.store.set_transcript(String::new()),
            StreamTarget::Article => self.store.set_final_article(String::new()),
            StreamTarget::Supplement | StreamTarget::Extension => {}
        }
    }

    fn on_first_chunk(&mut self) {
        // additive banners land with the first chunk, never before the request opens
        if !self.banner.is_empty() {
            let banner = std::mem::take(&mut self.banner);
            self.append(&banner);
        }
        self.store.clear_preparing(self.target.step());
    }

    fn on_chunk(&mut self, chunk: &StreamChunk, _merged: &CitationSet) {
        self.append(&chunk.text);
        if self.target.collects_citations() && !chunk.citations.is_empty() {
            self.store.merge_citations(&chunk.citations);
        }
        self.store.notify_chunk(self.target.step(), &chunk.text);
    }

    fn on_complete(&mut self, citations: &CitationSet) {
        if self.target.collects_citations() {
            self.store.merge_citations(&citations.to_vec());
        }
    }
}

/// Top-level workflow driver
pub struct Orchestrator {
    store: WorkflowStore,
    generator: Arc<dyn Generator>,
    config: WorkflowConfig,
    snapshots: Option<Arc<dyn SnapshotStore>>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("store", &self.store)
            .field("config", &self.config)
            .field("snapshots", &self.snapshots)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create orchestrator with a fresh workflow and no persistence
    #[must_use]
    pub fn new(generator: Arc<dyn Generator>, config: WorkflowConfig) -> Self {
        Self {
            store: WorkflowStore::new(),
            generator,
            config,
            snapshots: None,
        }
    }

    /// Create orchestrator around an existing store
    #[must_use]
    pub fn with_store(
        generator: Arc<dyn Generator>,
        config: WorkflowConfig,
        store: WorkflowStore,
    ) -> Self {
        Self {
            store,
            generator,
            config,
            snapshots: None,
        }
    }

    /// Restore from `snapshots` (defaults when nothing is stored) and keep
    /// the store attached for autosave
    ///
    /// # Errors
    /// `WorkflowError::Persistence` if the stored record cannot be read
    pub async fn open(
        generator: Arc<dyn Generator>,
        config: WorkflowConfig,
        snapshots: Arc<dyn SnapshotStore>,
    ) -> Result<Self, WorkflowError> {
        config.validate()?;
        let store = match load_snapshot(snapshots.as_ref(), &config.app_key).await? {
            Some(snapshot) => {
                tracing::info!(key = %config.app_key, "restored workflow snapshot");
                WorkflowStore::restore(snapshot)
            }
            None => WorkflowStore::new(),
        };
        Ok(Self {
            store,
            generator,
            config,
            snapshots: Some(snapshots),
        })
    }

    /// Attach a snapshot store
    #[must_use]
    pub fn with_snapshot_store(mut self, snapshots: Arc<dyn SnapshotStore>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> &WorkflowState {
        self.store.state()
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Receive state change events
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<WorkflowEvent> {
        self.store.subscribe()
    }

    // --- generation --------------------------------------------------------

    /// Run a generation action, or hold it for confirmation when it would
    /// overwrite a logically complete step
    ///
    /// # Errors
    /// Locked prerequisites, input preconditions and classified generation
    /// failures; every error is also written to the last-error slot.
    #[tracing::instrument(skip(self), fields(step = %action.step()))]
    pub async fn dispatch(&mut self, action: StepAction) -> Result<Dispatch, WorkflowError> {
        self.check_prerequisites(action)?;

        let step = action.step();
        if action.is_destructive() && StepCompletionPolicy::is_complete(self.state(), step) {
            tracing::info!("step already complete, confirmation required");
            let message = format!(
                "Rerunning step {step} ({}) will discard it and every later step. Continue?",
                step.label()
            );
            return Ok(Dispatch::ConfirmationRequired(Confirmation::request(
                action, message,
            )));
        }

        self.execute(action).await?;
        Ok(Dispatch::Completed)
    }

    /// Accept or decline a held rerun
    ///
    /// # Errors
    /// Same as [`Orchestrator::dispatch`]
    #[tracing::instrument(skip(self, confirmation), fields(action = %confirmation.effect()))]
    pub async fn resolve(
        &mut self,
        confirmation: Confirmation<StepAction>,
        accept: bool,
    ) -> Result<Resolution, WorkflowError> {
        let Some(action) = confirmation.resolve(accept) else {
            tracing::debug!("rerun declined");
            return Ok(Resolution::Declined);
        };

        self.check_prerequisites(action)?;
        self.store.invalidate_from(action.step());
        self.execute(action).await?;
        Ok(Resolution::Completed)
    }

    fn check_prerequisites(&mut self, action: StepAction) -> Result<(), WorkflowError> {
        let step = action.step();
        if StepCompletionPolicy::prerequisites_met(self.state(), step) {
            Ok(())
        } else {
            Err(self.fail(WorkflowError::StepLocked(step)))
        }
    }

    async fn execute(&mut self, action: StepAction) -> Result<(), WorkflowError> {
        tracing::info!(%action, "dispatching");
        self.store.clear_error();

        let result = self.run_action(action).await;
        let result = match result {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail(err)),
        };
        self.persist().await;
        result
    }

    async fn run_action(&mut self, action: StepAction) -> Result<(), WorkflowError> {
        match action {
            StepAction::GenerateTopic => self.generate_topic().await,
            StepAction::GeneratePanel => self.generate_panel().await,
            StepAction::Research => {
                let request = self
                    .request(PromptSlot::Research, None)
                    .with_web_search(self.config.web_search);
                self.stream(StreamTarget::Research, request, String::new())
                    .await
                    .map(drop)
            }
            StepAction::SupplementResearch => self.supplement_research().await,
            StepAction::StartDiscussion => {
                let request = self.request(
                    PromptSlot::DiscussionStart,
                    Some(PromptSlot::DiscussionSystemInstruction),
                );
                self.stream(StreamTarget::Discussion, request, String::new())
                    .await
                    .map(drop)
            }
            StepAction::ExtendDiscussion => {
                // start and extend are exclusive: extend needs a transcript
                if self.state().transcript.trim().is_empty() {
                    return Err(WorkflowError::EmptyTranscript);
                }
                let request = self.request(
                    PromptSlot::DiscussionExtend,
                    Some(PromptSlot::DiscussionSystemInstruction),
                );
                let banner = self.config.extension_banner.clone();
                self.stream(StreamTarget::Extension, request, banner)
                    .await
                    .map(drop)
            }
            StepAction::GenerateArticle => {
                let request = self.request(
                    PromptSlot::ArticleGen,
                    Some(PromptSlot::ArticleSystemInstruction),
                );
                self.stream(StreamTarget::Article, request, String::new())
                    .await
                    .map(drop)
            }
        }
    }

    async fn generate_topic(&mut self) -> Result<(), WorkflowError> {
        let request = self.request(PromptSlot::TopicGen, None);

        let generator = Arc::clone(&self.generator);
        let call = async move { generator.generate_text(request).await }.boxed();
        let text = self.single_shot(Step::Topic, call).await?;
        self.store.set_topic_text(text.trim())
    }

    async fn generate_panel(&mut self) -> Result<(), WorkflowError> {
        let request = self.request(PromptSlot::PanelGen, None);

        let generator = Arc::clone(&self.generator);
        let call = async move {
            generator
                .generate_structured(request, panel_schema())
                .await
                .and_then(parse_panel)
        }
        .boxed();
        let characters = self.single_shot(Step::Panel, call).await?;
        tracing::info!(count = characters.len(), "panel generated");
        self.store.set_characters(characters);
        Ok(())
    }

    async fn supplement_research(&mut self) -> Result<(), WorkflowError> {
        let query = self.state().supplemental_query.trim().to_string();
        if query.is_empty() {
            return Err(WorkflowError::EmptyQuery);
        }
        let request = self
            .request(PromptSlot::ResearchSupplement, None)
            .with_web_search(self.config.web_search);
        let banner = render(
            &self.config.supplement_banner,
            &PromptVars::new().with("query", query),
        );
        self.stream(StreamTarget::Supplement, request, banner).await?;
        self.store.set_supplemental_query(String::new());
        Ok(())
    }

    /// Single-shot shape: loading on, await, loading off on every path
    async fn single_shot<T>(
        &mut self,
        step: Step,
        call: BoxFuture<'static, Result<T, GenerationError>>,
    ) -> Result<T, WorkflowError> {
        self.store.begin_loading(step, false);
        let result = call.await;
        self.store.finish_loading(step);
        result.map_err(|err| WorkflowError::classify(step, err))
    }

    /// Streaming shape: loading and preparing on, fold fragments into the
    /// store, both cleared on every path
    async fn stream(
        &mut self,
        target: StreamTarget,
        request: GenerationRequest,
        banner: String,
    ) -> Result<StreamSummary, WorkflowError> {
        let step = target.step();
        let request_id = request.id;
        self.store.begin_loading(step, true);

        let generator = Arc::clone(&self.generator);
        let open = async move { generator.generate_text_stream(request).await };
        let mut aggregator = StreamAggregator::new();
        let mut sink = StoreSink {
            store: &mut self.store,
            target,
            banner,
        };
        let result = aggregator.run(open, &mut sink).await;

        self.store.finish_loading(step);
        match result {
            Ok(summary) => {
                tracing::info!(
                    %request_id,
                    chunks = summary.chunks,
                    citations = summary.citations.len(),
                    "stream completed"
                );
                Ok(summary)
            }
            Err(err) => {
                tracing::warn!(
                    %request_id,
                    chunks = aggregator.chunk_count(),
                    "stream failed, keeping partial output"
                );
                Err(WorkflowError::classify(step, err))
            }
        }
    }

    fn prompt_vars(&self) -> PromptVars {
        let state = self.state();
        PromptVars::new()
            .with("topic", state.topic.text.clone())
            .with("researchData", state.research_data.clone())
            .with("transcript", state.transcript.clone())
            .with("query", state.supplemental_query.trim().to_string())
            .with_characters(&state.characters)
    }

    /// Render `slot` (and the optional system slot) into a request and
    /// record the text that was sent
    fn request(&mut self, slot: PromptSlot, system: Option<PromptSlot>) -> GenerationRequest {
        let vars = self.prompt_vars();
        let prompts = &self.state().prompts;
        let prompt = prompts.render(slot, &vars);
        let instruction = system.map(|system| (system, prompts.render(system, &vars)));

        self.store.record_resolved_prompt(slot, prompt.clone());
        let request = GenerationRequest::new(prompt);
        match instruction {
            Some((system, text)) => {
                self.store.record_resolved_prompt(system, text.clone());
                request.with_system_instruction(text)
            }
            None => request,
        }
    }

    // --- user actions ------------------------------------------------------

    /// Edit the topic text before confirmation
    ///
    /// # Errors
    /// `WorkflowError::TopicLocked` once confirmed
    pub async fn set_topic_text(&mut self, text: impl Into<String>) -> Result<(), WorkflowError> {
        let text = text.into();
        self.act(|store| store.set_topic_text(text)).await
    }

    /// Confirm the topic and advance to research
    ///
    /// # Errors
    /// `WorkflowError::EmptyTopic` for blank text
    pub async fn confirm_topic(&mut self) -> Result<(), WorkflowError> {
        self.act(WorkflowStore::confirm_topic).await
    }

    /// Unconfirm the topic and clear every later step
    pub async fn reset_topic(&mut self) {
        self.store.reset_topic();
        self.persist().await;
    }

    /// Clear the whole workflow; prompt edits survive
    pub async fn reset_workflow(&mut self) {
        self.store.reset_workflow();
        self.persist().await;
    }

    /// Add a manually entered panelist; clears discussion and article
    ///
    /// # Errors
    /// `WorkflowError::InvalidCharacter` if any field is blank
    pub async fn add_character(
        &mut self,
        name: impl Into<String>,
        profession: impl Into<String>,
        background: impl Into<String>,
    ) -> Result<(), WorkflowError> {
        let character = Character::manual(name, profession, background);
        self.act(|store| {
            store.add_character(character?);
            Ok(())
        })
        .await
    }

    /// Remove a panelist; clears discussion and article
    ///
    /// # Errors
    /// `WorkflowError::CharacterOutOfRange` for a bad index
    pub async fn remove_character(&mut self, index: usize) -> Result<Character, WorkflowError> {
        self.act(|store| store.remove_character(index)).await
    }

    /// Set the follow-up research query
    pub fn set_supplemental_query(&mut self, query: impl Into<String>) {
        self.store.set_supplemental_query(query.into());
    }

    /// Edit the article in place
    pub async fn edit_article(&mut self, text: impl Into<String>) {
        self.store.set_final_article(text.into());
        self.persist().await;
    }

    /// Acknowledge an article save
    pub async fn save_article(&mut self) {
        self.store.save_article();
        self.persist().await;
    }

    /// Advance past the active step once it is complete
    ///
    /// # Errors
    /// `WorkflowError::StepIncomplete`
    pub fn proceed(&mut self) -> Result<Step, WorkflowError> {
        self.store.proceed().map_err(|err| self.fail(err))
    }

    /// Navigate to a reachable step
    ///
    /// # Errors
    /// `WorkflowError::StepLocked`
    pub fn go_to_step(&mut self, step: Step) -> Result<(), WorkflowError> {
        self.store.go_to_step(step).map_err(|err| self.fail(err))
    }

    /// Edit a prompt template
    pub async fn set_prompt(&mut self, slot: PromptSlot, template: impl Into<String>) {
        self.store.set_prompt(slot, template);
        self.persist().await;
    }

    /// Restore one prompt template
    pub async fn reset_prompt(&mut self, slot: PromptSlot) {
        self.store.reset_prompt(slot);
        self.persist().await;
    }

    /// Restore every prompt template
    pub async fn reset_prompts(&mut self) {
        self.store.reset_prompts();
        self.persist().await;
    }

    // --- persistence and errors --------------------------------------------

    /// Write a snapshot now
    ///
    /// # Errors
    /// `WorkflowError::Persistence` on store failure; no-op without a store
    pub async fn save(&self) -> Result<(), WorkflowError> {
        if let Some(snapshots) = &self.snapshots {
            save_snapshot(snapshots.as_ref(), &self.config.app_key, &self.store.snapshot())
                .await?;
        }
        Ok(())
    }

    async fn persist(&self) {
        if !self.config.autosave {
            return;
        }
        if let Err(err) = self.save().await {
            tracing::warn!(error = %err, "autosave failed");
        }
    }

    async fn act<T>(
        &mut self,
        action: impl FnOnce(&mut WorkflowStore) -> Result<T, WorkflowError>,
    ) -> Result<T, WorkflowError> {
        match action(&mut self.store) {
            Ok(value) => {
                self.persist().await;
                Ok(value)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn fail(&mut self, err: WorkflowError) -> WorkflowError {
        tracing::warn!(error = %err, kind = ?err.kind(), "action failed");
        self.store.set_error(err.to_string());
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::MockGenerator;
    use crate::persistence::{MemorySnapshotStore, DEFAULT_APP_KEY};
    use crate::types::Citation;
    use futures::{stream, StreamExt};

    fn completed_research_store() -> WorkflowStore {
        let mut store = WorkflowStore::new();
        store.set_topic_text("Lunar mining").unwrap();
        store.confirm_topic().unwrap();
        store.set_research_data("r".repeat(80));
        store
    }

    fn orchestrator(mock: MockGenerator, store: WorkflowStore) -> Orchestrator {
        Orchestrator::with_store(Arc::new(mock), WorkflowConfig::new(), store)
    }

    #[tokio::test]
    async fn completed_step_needs_confirmation_and_dispatches_nothing() {
        let mut mock = MockGenerator::new();
        mock.expect_generate_text_stream().never();
        mock.expect_generate_text().never();
        mock.expect_generate_structured().never();

        let mut orch = orchestrator(mock, completed_research_store());
        let before = orch.state().clone();

        let dispatch = orch.dispatch(StepAction::Research).await.unwrap();
        let Dispatch::ConfirmationRequired(pending) = dispatch else {
            panic!("expected confirmation");
        };
        assert_eq!(orch.state(), &before);

        let resolution = orch.resolve(pending, false).await.unwrap();
        assert_eq!(resolution, Resolution::Declined);
        assert_eq!(orch.state(), &before);
    }

    #[tokio::test]
    async fn locked_step_is_rejected_without_a_call() {
        let mut mock = MockGenerator::new();
        mock.expect_generate_structured().never();

        let mut orch = orchestrator(mock, WorkflowStore::new());
        let err = orch.dispatch(StepAction::GeneratePanel).await.unwrap_err();

        assert_eq!(err, WorkflowError::StepLocked(Step::Panel));
        assert!(orch.state().last_error.is_some());
    }

    #[tokio::test]
    async fn research_stream_uses_grounding_and_rendered_prompt() {
        let mut mock = MockGenerator::new();
        mock.expect_generate_text_stream()
            .withf(|request| request.web_search && request.prompt.contains("Lunar mining"))
            .times(1)
            .returning(|_| {
                Ok(stream::iter(vec![
                    Ok(StreamChunk::text("Regolith ")
                        .with_citations(vec![Citation::new("NASA", "https://nasa.gov")])),
                    Ok(StreamChunk::text("water ice")),
                ])
                .boxed())
            });

        let mut store = WorkflowStore::new();
        store.set_topic_text("Lunar mining").unwrap();
        store.confirm_topic().unwrap();
        let mut orch = orchestrator(mock, store);

        assert_eq!(orch.dispatch(StepAction::Research).await.unwrap(), Dispatch::Completed);
        assert_eq!(orch.state().research_data, "Regolith water ice");
        assert_eq!(orch.state().citations.len(), 1);
        assert!(!orch.state().is_loading(Step::Research));
        assert_eq!(orch.state().preparing_step, None);
        // never auto-advances
        assert_eq!(orch.state().current_step, Step::Research);
    }

    #[tokio::test]
    async fn quota_error_is_reported_distinctly() {
        let mut mock = MockGenerator::new();
        mock.expect_generate_text().times(1).returning(|_| {
            Err(GenerationError::Status {
                status: 429,
                message: "Too Many Requests".to_string(),
            })
        });

        let mut orch = orchestrator(mock, WorkflowStore::new());
        let err = orch.dispatch(StepAction::GenerateTopic).await.unwrap_err();

        assert_eq!(err, WorkflowError::QuotaExceeded { step: Step::Topic });
        assert!(orch
            .state()
            .last_error
            .as_deref()
            .is_some_and(|msg| msg.contains("try again shortly")));
        assert!(!orch.state().is_loading(Step::Topic));
    }

    #[tokio::test]
    async fn generated_topic_is_recorded_with_prompt() {
        let mut mock = MockGenerator::new();
        mock.expect_generate_text()
            .times(1)
            .returning(|_| Ok("  Vertical farming \n".to_string()));

        let mut orch = orchestrator(mock, WorkflowStore::new());
        assert_eq!(orch.dispatch(StepAction::GenerateTopic).await.unwrap(), Dispatch::Completed);

        assert_eq!(orch.state().topic.text, "Vertical farming");
        assert!(!orch.state().topic.confirmed);
        assert!(orch
            .state()
            .prompts
            .last_resolved(PromptSlot::TopicGen)
            .is_some());
    }

    #[tokio::test]
    async fn autosave_writes_snapshot() {
        let mut mock = MockGenerator::new();
        mock.expect_generate_text()
            .returning(|_| Ok("Ocean farming".to_string()));

        let snapshots = Arc::new(MemorySnapshotStore::new());
        let mut orch = Orchestrator::new(Arc::new(mock), WorkflowConfig::new())
            .with_snapshot_store(snapshots.clone());

        assert_eq!(orch.dispatch(StepAction::GenerateTopic).await.unwrap(), Dispatch::Completed);
        orch.confirm_topic().await.unwrap();

        let stored = load_snapshot(snapshots.as_ref(), DEFAULT_APP_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.topic, "Ocean farming");
        assert!(stored.topic_confirmed);
        assert_eq!(snapshots.len(), 1);
    }

    #[tokio::test]
    async fn open_restores_under_configured_key() {
        let snapshots = Arc::new(MemorySnapshotStore::new());
        assert!(snapshots.is_empty());
        save_snapshot(
            snapshots.as_ref(),
            "kelp",
            &completed_research_store().snapshot(),
        )
        .await
        .unwrap();

        let config = WorkflowConfig::new().with_app_key("kelp");
        let orch = Orchestrator::open(Arc::new(MockGenerator::new()), config, snapshots.clone())
            .await
            .unwrap();
        assert_eq!(orch.config().app_key, "kelp");
        assert_eq!(orch.state().topic.text, "Lunar mining");

        let fresh = Orchestrator::open(
            Arc::new(MockGenerator::new()),
            WorkflowConfig::new(),
            snapshots,
        )
        .await
        .unwrap();
        assert_eq!(fresh.config().app_key, DEFAULT_APP_KEY);
        assert!(fresh.state().topic.text.is_empty());
    }

    #[test]
    fn action_classification() {
        assert!(StepAction::Research.is_destructive());
        assert!(!StepAction::ExtendDiscussion.is_destructive());
        assert!(!StepAction::SupplementResearch.is_destructive());
        assert!(!StepAction::GeneratePanel.is_streaming());
        assert_eq!(StepAction::ExtendDiscussion.step(), Step::Discussion);
    }
}
