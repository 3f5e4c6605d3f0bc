use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::FixedInterval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::disclaimer::Disclaimer;
use crate::error::{CompanionError, Result};
use crate::models::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationParams, PromptRequest,
    SafetySetting,
};
use crate::transport::Transport;

/// Finish reasons that mean the candidate was withheld for policy reasons
const SAFETY_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

/// What a single provider attempt amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderResponse {
    TextResult(String),
    SafetyBlock(String),
    QuotaExceeded(String),
    EmptyResult,
    TransientError(String),
    FatalError(String),
}

impl ProviderResponse {
    pub fn classify(result: Result<GenerateContentResponse>) -> Self {
        match result {
            Ok(response) => Self::from_response(&response),
            Err(e) => Self::from_error(&e),
        }
    }

    fn from_response(response: &GenerateContentResponse) -> Self {
        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone())
        {
            return Self::SafetyBlock(reason);
        }
        if let Some(text) = response.text() {
            return Self::TextResult(text);
        }
        match response
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
        {
            Some(reason) if SAFETY_FINISH_REASONS.contains(&reason) => {
                Self::SafetyBlock(reason.to_string())
            }
            _ => Self::EmptyResult,
        }
    }

    fn from_error(err: &CompanionError) -> Self {
        match err {
            CompanionError::Api { status: 429, message } => Self::QuotaExceeded(message.clone()),
            CompanionError::Api { status, message } if *status == 401 || *status == 403 => {
                Self::FatalError(message.clone())
            }
            CompanionError::Api { status: 400, message }
                if message.contains("API key") || message.contains("API_KEY") =>
            {
                Self::FatalError(message.clone())
            }
            CompanionError::Api { status, message } if *status >= 500 || *status == 408 => {
                Self::TransientError(format!("status {status}: {message}"))
            }
            CompanionError::Api { status, message } => {
                Self::FatalError(format!("status {status}: {message}"))
            }
            CompanionError::Config(message) => Self::FatalError(message.clone()),
            other => Self::TransientError(other.to_string()),
        }
    }

    /// Only empty answers and transient faults are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmptyResult | Self::TransientError(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SafetyBlock,
    QuotaExceeded,
    EmptyResponse,
    ProviderUnavailable,
    Rejected,
    Cancelled,
}

/// Tagged result handed to callers. Callers branch on the variant, the
/// message is for display only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success { text: String },
    Failure { kind: FailureKind, message: String },
}

impl Outcome {
    fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Text to display: the answer with its disclaimer, or the failure message
    pub fn text(&self) -> &str {
        match self {
            Self::Success { text } => text,
            Self::Failure { message, .. } => message,
        }
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

impl Serialize for Outcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Outcome", 3)?;
        state.serialize_field("ok", &self.is_ok())?;
        state.serialize_field("text", self.text())?;
        state.serialize_field("failure", &self.failure_kind())?;
        state.end()
    }
}

/// Bounded retry with a fixed pause. No backoff, no jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            max_attempts: cfg.retry.max_attempts.max(1),
            delay: cfg.retry_delay(),
        }
    }

    fn strategy(&self) -> std::iter::Take<FixedInterval> {
        let retries = self.max_attempts.saturating_sub(1) as usize;
        FixedInterval::new(self.delay).take(retries)
    }
}

/// Turns (instruction, content) pairs into displayable outcomes.
///
/// Holds one long-lived transport; the instruction travels with each request.
pub struct ResponseOrchestrator {
    tx: Arc<dyn Transport>,
    model: String,
    generation: GenerationParams,
    safety: Vec<SafetySetting>,
    retry: RetryPolicy,
    disclaimer: Disclaimer,
}

impl ResponseOrchestrator {
    pub fn new(
        tx: Arc<dyn Transport>,
        model: String,
        generation: GenerationParams,
        safety: Vec<SafetySetting>,
        retry: RetryPolicy,
        disclaimer: Disclaimer,
    ) -> Self {
        Self {
            tx,
            model,
            generation,
            safety,
            retry,
            disclaimer,
        }
    }

    pub fn from_config(tx: Arc<dyn Transport>, cfg: &Config) -> Self {
        let generation = GenerationParams {
            temperature: cfg.generation.temperature,
            top_p: cfg.generation.top_p,
            top_k: cfg.generation.top_k,
            max_output_tokens: cfg.generation.max_output_tokens,
        };
        Self::new(
            tx,
            cfg.gemini.model.clone(),
            generation,
            cfg.safety.to_settings(),
            RetryPolicy::from_config(cfg),
            Disclaimer::from_config(&cfg.disclaimer),
        )
    }

    pub fn disclaimer(&self) -> &Disclaimer {
        &self.disclaimer
    }

    pub fn build_request(&self, prompt: &PromptRequest) -> GenerateContentRequest {
        GenerateContentRequest {
            model: self.model.clone(),
            system_instruction: Content::system(prompt.instruction()),
            contents: vec![Content::user(prompt.content())],
            generation_config: self.generation.clone(),
            safety_settings: self.safety.clone(),
        }
    }

    pub async fn respond(&self, prompt: &PromptRequest) -> Outcome {
        let request = self.build_request(prompt);
        let attempts = AtomicU32::new(0);

        let tx = &self.tx;
        let request = &request;
        let counter = &attempts;
        let max_attempts = self.retry.max_attempts;

        info!(
            model = %self.model,
            content_chars = prompt.content().chars().count(),
            "Requesting generation"
        );

        let result = RetryIf::spawn(
            self.retry.strategy(),
            move || async move {
                let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(attempt, max_attempts, "Calling generative provider");
                match ProviderResponse::classify(tx.generate(request).await) {
                    ProviderResponse::TextResult(text) => Ok(text),
                    other => {
                        warn!(attempt, max_attempts, response = ?other, "Provider attempt failed");
                        Err(other)
                    }
                }
            },
            |response: &ProviderResponse| response.is_retryable(),
        )
        .await;

        let attempts = attempts.load(Ordering::SeqCst);
        match result {
            Ok(text) => {
                info!(attempts, "Generation succeeded");
                Outcome::Success {
                    text: self.disclaimer.append(&text),
                }
            }
            Err(response) => Self::failure_outcome(response, attempts),
        }
    }

    /// Like `respond`, but gives up as soon as `token` is cancelled.
    /// Dropping the in-flight future also drops any pending retry.
    pub async fn respond_until_cancelled(
        &self,
        prompt: &PromptRequest,
        token: &CancellationToken,
    ) -> Outcome {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                info!("Generation cancelled by caller");
                Outcome::failure(FailureKind::Cancelled, "Richiesta annullata.")
            }
            outcome = self.respond(prompt) => outcome,
        }
    }

    fn failure_outcome(response: ProviderResponse, attempts: u32) -> Outcome {
        match response {
            ProviderResponse::SafetyBlock(reason) => Outcome::failure(
                FailureKind::SafetyBlock,
                format!(
                    "Risposta bloccata dai filtri di sicurezza (motivo: {reason}). \
                     Prova a riformulare la richiesta."
                ),
            ),
            ProviderResponse::QuotaExceeded(_) => Outcome::failure(
                FailureKind::QuotaExceeded,
                "Limite di utilizzo del servizio raggiunto. Riprova tra qualche minuto.",
            ),
            ProviderResponse::EmptyResult => Outcome::failure(
                FailureKind::EmptyResponse,
                format!(
                    "Il modello non ha restituito alcuna risposta dopo {attempts} tentativi. \
                     Riprova o riformula la domanda."
                ),
            ),
            ProviderResponse::TransientError(_) => Outcome::failure(
                FailureKind::ProviderUnavailable,
                format!(
                    "Servizio momentaneamente non disponibile dopo {attempts} tentativi. \
                     Riprova più tardi."
                ),
            ),
            ProviderResponse::FatalError(detail) => {
                warn!(%detail, "Provider rejected the request");
                Outcome::failure(
                    FailureKind::Rejected,
                    "La richiesta è stata rifiutata dal servizio. \
                     Se il problema persiste contatta l'amministratore.",
                )
            }
            // Successful text never reaches the failure path
            ProviderResponse::TextResult(_) => Outcome::failure(
                FailureKind::ProviderUnavailable,
                "Servizio momentaneamente non disponibile.",
            ),
        }
    }
}
