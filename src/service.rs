use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::{Config, ContentConfig};
use crate::download::DownloadArtifact;
use crate::error::{CompanionError, ExtractionError, Result};
use crate::extract::{PdfTextExtractor, TextExtractor, truncate_chars};
use crate::models::{ConversationTurn, PromptRequest, VideoResult};
use crate::orchestrator::{Outcome, ResponseOrchestrator};
use crate::prompts::Task;
use crate::session::SessionStore;
use crate::topic::extract_topic;
use crate::transport::{GeminiTransport, Transport};
use crate::video::{VideoSearch, YouTubeSearch};

/// Reply to one wellness chat message
#[derive(Debug, Serialize)]
pub struct ChatReply {
    pub session_id: Uuid,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub videos: Vec<VideoResult>,
    pub turns: usize,
}

/// Result of a report or drug analysis
#[derive(Debug, Serialize)]
pub struct AnalysisReply {
    pub task: Task,
    #[serde(flatten)]
    pub outcome: Outcome,
    /// Present only when the analysis succeeded
    pub download: Option<DownloadArtifact>,
}

/// The four call sites of the orchestrator, plus the state they share
pub struct CompanionService {
    orchestrator: ResponseOrchestrator,
    videos: Arc<dyn VideoSearch>,
    extractor: Arc<dyn TextExtractor>,
    sessions: SessionStore,
    content: ContentConfig,
    shutdown: CancellationToken,
}

impl CompanionService {
    /// Build the production service. Fails only on configuration problems.
    pub fn new(cfg: &Config, shutdown: CancellationToken) -> Result<Self> {
        cfg.ensure_credentials()?;
        let transport = Arc::new(GeminiTransport::new(
            cfg.gemini.api_key.clone(),
            cfg.gemini.base_url.clone(),
            cfg.gemini_timeout(),
        )?);
        let videos = Arc::new(YouTubeSearch::from_config(&cfg.video)?);

        Ok(Self::with_parts(
            ResponseOrchestrator::from_config(transport as Arc<dyn Transport>, cfg),
            videos,
            Arc::new(PdfTextExtractor),
            cfg.content.clone(),
            shutdown,
        ))
    }

    pub fn with_parts(
        orchestrator: ResponseOrchestrator,
        videos: Arc<dyn VideoSearch>,
        extractor: Arc<dyn TextExtractor>,
        content: ContentConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            orchestrator,
            videos,
            extractor,
            sessions: SessionStore::new(),
            content,
            shutdown,
        }
    }

    async fn run(&self, task: Task, content: String) -> Outcome {
        tracing::info!(%task, "Running task");
        let prompt = PromptRequest::new(task.instruction(), content);
        let outcome = self
            .orchestrator
            .respond_until_cancelled(&prompt, &self.shutdown)
            .await;
        if let Some(kind) = outcome.failure_kind() {
            tracing::warn!(%task, ?kind, "Task finished without an answer");
        }
        outcome
    }

    fn analysis_reply(&self, task: Task, outcome: Outcome, stem: &str) -> AnalysisReply {
        let download = outcome
            .is_ok()
            .then(|| self.download(outcome.text(), stem));
        AnalysisReply {
            task,
            outcome,
            download,
        }
    }

    /// Chat with the wellness coach. Successful replies come with video
    /// suggestions; a failed lookup just means no suggestions.
    pub async fn wellness_chat(&self, session: Option<Uuid>, message: &str) -> Result<ChatReply> {
        let message = require_text(message, "message")?;
        let session_id = self.sessions.open(session).await;

        let outcome = self.run(Task::WellnessChat, message.to_string()).await;
        let videos = if outcome.is_ok() {
            self.videos.lookup_videos(&extract_topic(message)).await
        } else {
            Vec::new()
        };

        let turns = self
            .sessions
            .record_exchange(session_id, message, outcome.text())
            .await;

        Ok(ChatReply {
            session_id,
            outcome,
            videos,
            turns,
        })
    }

    pub async fn end_session(&self, session_id: Uuid) -> bool {
        self.sessions.end(session_id).await
    }

    /// Turns of a live chat session, oldest first
    pub async fn chat_history(&self, session_id: Uuid) -> Option<Vec<ConversationTurn>> {
        self.sessions.history(session_id).await
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Simplify an uploaded medical report. Extraction failures stop here,
    /// before any provider call.
    pub async fn analyze_report(&self, pdf: Vec<u8>) -> Result<AnalysisReply> {
        let text = self.extract(pdf).await?;
        let content = match self.content.report_max_chars {
            Some(max) => truncate_chars(&text, max).to_string(),
            None => text,
        };

        let outcome = self.run(Task::ReportAnalysis, content).await;
        Ok(self.analysis_reply(Task::ReportAnalysis, outcome, "analisi_referto"))
    }

    pub async fn drug_info(&self, name: &str) -> Result<AnalysisReply> {
        let name = require_text(name, "drug name")?;
        let outcome = self.run(Task::DrugByName, format!("Farmaco: {name}")).await;
        Ok(self.analysis_reply(Task::DrugByName, outcome, &format!("info_{name}")))
    }

    /// Drug lookup grounded on an excerpt of an uploaded leaflet
    pub async fn drug_info_from_pdf(&self, name: &str, pdf: Vec<u8>) -> Result<AnalysisReply> {
        let name = require_text(name, "drug name")?;
        let text = self.extract(pdf).await?;
        let excerpt = truncate_chars(&text, self.content.drug_excerpt_chars);
        let content = format!("Farmaco: {name}\n\nContesto:\n{excerpt}...");

        let outcome = self.run(Task::DrugFromPdf, content).await;
        Ok(self.analysis_reply(Task::DrugFromPdf, outcome, &format!("info_{name}_pdf")))
    }

    /// Downloadable copy of a displayed answer, disclaimer removed
    pub fn download(&self, displayed: &str, stem: &str) -> DownloadArtifact {
        DownloadArtifact::new(displayed, stem, self.orchestrator.disclaimer())
    }

    async fn extract(&self, pdf: Vec<u8>) -> Result<String> {
        let extractor = Arc::clone(&self.extractor);
        let text = tokio::task::spawn_blocking(move || extractor.extract_text(&pdf))
            .await
            .map_err(|e| ExtractionError::Unreadable(format!("extraction task failed: {e}")))??;
        tracing::info!(chars = text.chars().count(), "PDF text extracted");
        Ok(text)
    }
}

fn require_text<'a>(value: &'a str, field: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CompanionError::Validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed)
}
