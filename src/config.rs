use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{CompanionError, Result};
use crate::models::{HarmBlockThreshold, HarmCategory, SafetySetting};

const PLACEHOLDER_API_KEY: &str = "PLACEHOLDER_GEMINI_API_KEY";

/// Main configuration structure for the wellness companion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub generation: GenerationConfig,
    pub safety: SafetyConfig,
    pub retry: RetryConfig,
    pub video: VideoConfig,
    pub content: ContentConfig,
    pub disclaimer: DisclaimerConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    /// Optional bearer token required on every route except /health
    #[serde(default)]
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
}

/// Sampling parameters sent with every generation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    pub harassment: HarmBlockThreshold,
    pub hate_speech: HarmBlockThreshold,
    pub sexually_explicit: HarmBlockThreshold,
    pub dangerous_content: HarmBlockThreshold,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total provider attempts, first call included
    pub max_attempts: u32,
    /// Fixed pause before each retry
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub max_results: u32,
    pub language: String,
    pub region: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Characters of extracted PDF text forwarded with a drug lookup
    pub drug_excerpt_chars: usize,
    /// Optional bound on extracted report text; `None` forwards everything
    #[serde(default)]
    pub report_max_chars: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisclaimerConfig {
    pub delimiter: String,
    pub body: String,
}

/// Chat sessions idle longer than `idle_ttl_seconds` are dropped by a
/// periodic sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    pub idle_ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl_seconds: 1800,
            sweep_interval_seconds: 60,
        }
    }
}

impl Config {
    /// Load configuration from file with environment variable overrides.
    /// Never fails; missing credentials are caught by `ensure_credentials`.
    pub fn load() -> Self {
        let env_paths = [".env", "../.env"];

        let mut env_loaded = false;
        for path in &env_paths {
            if dotenvy::from_path(path).is_ok() {
                tracing::info!("Loaded .env from: {}", path);
                env_loaded = true;
                break;
            }
        }

        if !env_loaded {
            tracing::warn!("No .env file found - continuing with env vars only");
        }

        let config_path =
            env::var("COMPANION_CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            match fs::read_to_string(&config_path) {
                Ok(contents) => match serde_yaml::from_str::<Config>(&contents) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from {}", config_path);
                        config
                    }
                    Err(e) => {
                        tracing::error!(
                            "Failed to parse config file {}: {} - using defaults",
                            config_path,
                            e
                        );
                        Self::default()
                    }
                },
                Err(e) => {
                    tracing::error!(
                        "Failed to read config file {}: {} - using defaults",
                        config_path,
                        e
                    );
                    Self::default()
                }
            }
        } else {
            tracing::warn!("Config file not found at {} - using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();

        if let Err(e) = config.validate() {
            tracing::warn!("Config validation warnings: {} - continuing anyway", e);
        }

        config
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| env::var(key).ok());
    }

    /// Apply overrides from any key lookup (the process environment in production)
    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server overrides
        if let Some(bind) = lookup("COMPANION_BIND") {
            self.server.bind = bind;
        }
        if let Some(token) = lookup("COMPANION_BEARER_TOKEN") {
            self.server.bearer_token = Some(token).filter(|t| !t.is_empty());
        }

        // Gemini overrides
        if let Some(api_key) = lookup("GEMINI_API_KEY") {
            self.gemini.api_key = api_key;
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            self.gemini.model = model;
        }
        if let Some(base_url) = lookup("GEMINI_BASE_URL") {
            self.gemini.base_url = base_url;
        }
        if let Some(timeout) = lookup("GEMINI_TIMEOUT_SECONDS") {
            if let Ok(secs) = timeout.parse() {
                self.gemini.timeout_seconds = secs;
            }
        }

        // Video search overrides
        if let Some(api_key) = lookup("YOUTUBE_API_KEY") {
            self.video.api_key = Some(api_key).filter(|k| !k.is_empty());
        }

        // Retry overrides
        if let Some(attempts) = lookup("COMPANION_RETRY_MAX_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.retry.max_attempts = n;
            }
        }
        if let Some(delay) = lookup("COMPANION_RETRY_DELAY_MS") {
            if let Ok(ms) = delay.parse() {
                self.retry.delay_ms = ms;
            }
        }

        // Content overrides
        if let Some(chars) = lookup("COMPANION_DRUG_EXCERPT_CHARS") {
            if let Ok(n) = chars.parse() {
                self.content.drug_excerpt_chars = n;
            }
        }

        // Session overrides
        if let Some(ttl) = lookup("COMPANION_SESSION_TTL_SECONDS") {
            if let Ok(secs) = ttl.parse() {
                self.session.idle_ttl_seconds = secs;
            }
        }
    }

    /// Validate configuration
    fn validate(&self) -> std::result::Result<(), Box<dyn std::error::Error>> {
        if self.retry.max_attempts == 0 {
            return Err("retry.max_attempts must be at least 1".into());
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err("generation.temperature must be between 0.0 and 2.0".into());
        }
        if !(0.0..=1.0).contains(&self.generation.top_p) {
            return Err("generation.top_p must be between 0.0 and 1.0".into());
        }
        if self.gemini.timeout_seconds == 0 || self.video.timeout_seconds == 0 {
            return Err("timeouts must be finite and non-zero".into());
        }
        if self.session.idle_ttl_seconds == 0 || self.session.sweep_interval_seconds == 0 {
            return Err("session TTL and sweep interval must be non-zero".into());
        }
        if self.disclaimer.delimiter.is_empty() {
            return Err("disclaimer.delimiter cannot be empty".into());
        }
        if self.video.api_key.is_none() {
            tracing::warn!("YOUTUBE_API_KEY not set, video suggestions disabled");
        }
        Ok(())
    }

    /// Pre-flight check run before serving anything: the generative
    /// credential is mandatory.
    pub fn ensure_credentials(&self) -> Result<()> {
        let key = self.gemini.api_key.trim();
        if key.is_empty() || key == PLACEHOLDER_API_KEY {
            return Err(CompanionError::Config(
                "GEMINI_API_KEY environment variable must be set".to_string(),
            ));
        }
        Ok(())
    }

    pub fn gemini_timeout(&self) -> Duration {
        Duration::from_secs(self.gemini.timeout_seconds)
    }

    pub fn video_timeout(&self) -> Duration {
        Duration::from_secs(self.video.timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry.delay_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session.idle_ttl_seconds)
    }

    pub fn session_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.session.sweep_interval_seconds)
    }
}

impl SafetyConfig {
    /// Safety settings in the provider's wire format
    pub fn to_settings(&self) -> Vec<SafetySetting> {
        vec![
            SafetySetting::new(HarmCategory::Harassment, self.harassment),
            SafetySetting::new(HarmCategory::HateSpeech, self.hate_speech),
            SafetySetting::new(HarmCategory::SexuallyExplicit, self.sexually_explicit),
            SafetySetting::new(HarmCategory::DangerousContent, self.dangerous_content),
        ]
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind: "127.0.0.1:8501".to_string(),
                bearer_token: None,
            },
            gemini: GeminiConfig {
                api_key: PLACEHOLDER_API_KEY.to_string(),
                model: "gemini-1.5-flash".to_string(),
                base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                timeout_seconds: 10,
            },
            generation: GenerationConfig {
                temperature: 0.6,
                top_p: 0.95,
                top_k: 40,
                max_output_tokens: 4096,
            },
            safety: SafetyConfig {
                harassment: HarmBlockThreshold::BlockMediumAndAbove,
                hate_speech: HarmBlockThreshold::BlockMediumAndAbove,
                sexually_explicit: HarmBlockThreshold::BlockMediumAndAbove,
                dangerous_content: HarmBlockThreshold::BlockOnlyHigh,
            },
            retry: RetryConfig {
                max_attempts: 2,
                delay_ms: 1500,
            },
            video: VideoConfig {
                api_key: None,
                base_url: "https://www.googleapis.com/youtube/v3".to_string(),
                max_results: 3,
                language: "it".to_string(),
                region: "IT".to_string(),
                timeout_seconds: 5,
            },
            content: ContentConfig {
                drug_excerpt_chars: 1000,
                report_max_chars: None,
            },
            disclaimer: DisclaimerConfig {
                delimiter: "\n\n---\n".to_string(),
                body: "*Nota: le informazioni fornite hanno scopo puramente informativo e non \
                       sostituiscono il parere di un medico o di un professionista della salute \
                       mentale. In caso di emergenza contatta il 112.*"
                    .to_string(),
            },
            session: SessionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_documented_generation_values() {
        let cfg = Config::default();
        assert!((cfg.generation.temperature - 0.6).abs() < 1e-6);
        assert!((cfg.generation.top_p - 0.95).abs() < 1e-6);
        assert_eq!(cfg.generation.top_k, 40);
        assert_eq!(cfg.generation.max_output_tokens, 4096);
        assert_eq!(cfg.retry.max_attempts, 2);
        assert_eq!(cfg.video.max_results, 3);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_placeholder_key_fails_preflight() {
        let cfg = Config::default();
        assert!(matches!(
            cfg.ensure_credentials(),
            Err(CompanionError::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides_applied() {
        let mut cfg = Config::default();
        cfg.apply_overrides_from(lookup_from(&[
            ("GEMINI_API_KEY", "real-key"),
            ("GEMINI_MODEL", "gemini-1.5-pro"),
            ("COMPANION_RETRY_DELAY_MS", "10"),
            ("COMPANION_DRUG_EXCERPT_CHARS", "250"),
            ("YOUTUBE_API_KEY", "yt-key"),
            ("COMPANION_SESSION_TTL_SECONDS", "600"),
        ]));
        assert_eq!(cfg.session.idle_ttl_seconds, 600);
        assert_eq!(cfg.gemini.api_key, "real-key");
        assert_eq!(cfg.gemini.model, "gemini-1.5-pro");
        assert_eq!(cfg.retry.delay_ms, 10);
        assert_eq!(cfg.content.drug_excerpt_chars, 250);
        assert_eq!(cfg.video.api_key.as_deref(), Some("yt-key"));
        assert!(cfg.ensure_credentials().is_ok());
    }

    #[test]
    fn test_unparseable_override_is_ignored() {
        let mut cfg = Config::default();
        cfg.apply_overrides_from(lookup_from(&[("COMPANION_RETRY_MAX_ATTEMPTS", "many")]));
        assert_eq!(cfg.retry.max_attempts, 2);
    }

    #[test]
    fn test_empty_video_key_disables_lookup() {
        let mut cfg = Config::default();
        cfg.apply_overrides_from(lookup_from(&[("YOUTUBE_API_KEY", "")]));
        assert!(cfg.video.api_key.is_none());
    }

    #[test]
    fn test_yaml_round_trip_keeps_thresholds() {
        let yaml = serde_yaml::to_string(&Config::default()).expect("serialize config");
        let parsed: Config = serde_yaml::from_str(&yaml).expect("parse config");
        assert_eq!(
            parsed.safety.dangerous_content,
            HarmBlockThreshold::BlockOnlyHigh
        );
        assert_eq!(parsed.safety.to_settings().len(), 4);
    }

    #[test]
    fn test_yaml_without_session_section_uses_defaults() {
        let mut value = serde_yaml::to_value(Config::default()).expect("serialize config");
        if let serde_yaml::Value::Mapping(map) = &mut value {
            map.remove("session");
        }
        let parsed: Config = serde_yaml::from_value(value).expect("parse config");
        assert_eq!(parsed.session.idle_ttl_seconds, 1800);
        assert_eq!(parsed.session_sweep_interval(), Duration::from_secs(60));
    }
}
