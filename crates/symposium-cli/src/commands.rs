//! Subcommand implementations over a persisted snapshot

use anyhow::{bail, Context as _, Result};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use symposium_core::{
    load_snapshot, save_snapshot, FileSnapshotStore, PromptSlot, Step, StepCompletionPolicy,
    StepStatus, WorkflowConfig, WorkflowStore,
};

/// Resolved global options
#[derive(Debug, Clone)]
pub(crate) struct Context {
    pub(crate) config: WorkflowConfig,
    pub(crate) dir: PathBuf,
    pub(crate) json: bool,
}

impl Context {
    fn snapshots(&self) -> FileSnapshotStore {
        FileSnapshotStore::new(&self.dir)
    }

    pub(crate) async fn load(&self) -> Result<WorkflowStore> {
        let snapshot = load_snapshot(&self.snapshots(), &self.config.app_key)
            .await
            .with_context(|| format!("reading snapshot from {}", self.dir.display()))?;
        Ok(snapshot.map(WorkflowStore::restore).unwrap_or_default())
    }

    pub(crate) async fn save(&self, store: &WorkflowStore) -> Result<()> {
        save_snapshot(&self.snapshots(), &self.config.app_key, &store.snapshot())
            .await
            .with_context(|| format!("writing snapshot to {}", self.dir.display()))?;
        tracing::info!(key = %self.config.app_key, "snapshot written");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct StatusReport<'a> {
    topic: &'a str,
    topic_confirmed: bool,
    current_step: Step,
    citations: usize,
    characters: usize,
    steps: [StepStatus; 5],
}

pub(crate) async fn status(ctx: &Context, out: &mut impl Write) -> Result<()> {
    let store = ctx.load().await?;
    let state = store.state();
    let report = StatusReport {
        topic: &state.topic.text,
        topic_confirmed: state.topic.confirmed,
        current_step: state.current_step,
        citations: state.citations.len(),
        characters: state.characters.len(),
        steps: StepCompletionPolicy::statuses(state),
    };

    if ctx.json {
        serde_json::to_writer_pretty(&mut *out, &report)?;
        writeln!(out)?;
        return Ok(());
    }

    let topic = if report.topic.is_empty() { "(none)" } else { report.topic };
    let confirmed = if report.topic_confirmed { "confirmed" } else { "draft" };
    writeln!(out, "Topic: {topic} [{confirmed}]")?;
    writeln!(
        out,
        "Citations: {}  Panel: {}",
        report.citations, report.characters
    )?;
    for status in &report.steps {
        let marker = if status.active { ">" } else { " " };
        let label = match (status.complete, status.reachable) {
            (true, _) => "complete",
            (false, true) => "open",
            (false, false) => "locked",
        };
        writeln!(
            out,
            "{marker} {}. {:<12} {label}",
            status.step,
            status.step.label()
        )?;
    }
    Ok(())
}

pub(crate) async fn reset(ctx: &Context, from: u8, out: &mut impl Write) -> Result<()> {
    let step = Step::try_from(from)?;
    let mut store = ctx.load().await?;
    if step == Step::Topic {
        store.reset_workflow();
    } else {
        store.invalidate_from(step);
    }
    ctx.save(&store).await?;
    writeln!(out, "Cleared step {step} ({}) and everything after it", step.label())?;
    Ok(())
}

pub(crate) async fn prompts(
    ctx: &Context,
    reset: bool,
    slot: Option<&str>,
    out: &mut impl Write,
) -> Result<()> {
    let slot = slot
        .map(str::parse::<PromptSlot>)
        .transpose()
        .map_err(anyhow::Error::msg)?;
    let mut store = ctx.load().await?;

    if reset {
        match slot {
            Some(slot) => store.reset_prompt(slot),
            None => store.reset_prompts(),
        }
        ctx.save(&store).await?;
    }

    let prompts = &store.state().prompts;
    let selected: Vec<_> = prompts
        .iter()
        .filter(|(s, _)| slot.map_or(true, |wanted| *s == wanted))
        .collect();

    if ctx.json {
        let map: serde_json::Map<String, serde_json::Value> = selected
            .iter()
            .map(|(s, template)| (s.name().to_string(), (*template).into()))
            .collect();
        serde_json::to_writer_pretty(&mut *out, &map)?;
        writeln!(out)?;
        return Ok(());
    }

    for (s, template) in selected {
        let marker = if prompts.is_customized(s) { "*" } else { " " };
        writeln!(out, "{marker} {s}")?;
        if slot.is_some() {
            writeln!(out, "{template}")?;
        }
    }
    Ok(())
}

pub(crate) async fn article(ctx: &Context, out: &mut impl Write) -> Result<()> {
    let store = ctx.load().await?;
    let article = &store.state().final_article;
    if article.trim().is_empty() {
        bail!("no article has been generated yet");
    }
    if ctx.json {
        serde_json::to_writer_pretty(
            &mut *out,
            &serde_json::json!({ "topic": store.state().topic.text, "article": article }),
        )?;
        writeln!(out)?;
    } else {
        writeln!(out, "{article}")?;
    }
    Ok(())
}
