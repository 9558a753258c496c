use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::models::block::BlockType;

/// Application configuration loaded from environment variables.
/// Every value has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub llm: LlmSettings,
    pub pipeline: PipelineConfig,
}

/// Connection settings for the text completion service.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    pub url: String,
    pub model: String,
    pub api_key: Option<String>,
}

/// Sampling parameters sent with a single completion call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_tokens: u32,
    pub seed: u64,
}

/// Per-block-type generation parameters.
///
/// Skills, projects and languages run fully deterministic; summary and
/// education are allowed more variance.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationProfiles {
    pub projects: GenerationParams,
    pub skills: GenerationParams,
    pub education: GenerationParams,
    pub languages: GenerationParams,
    pub summary: GenerationParams,
    pub segmentation: GenerationParams,
}

impl GenerationProfiles {
    pub fn for_block(&self, block_type: BlockType) -> GenerationParams {
        match block_type {
            BlockType::Projects => self.projects,
            BlockType::Skills => self.skills,
            BlockType::Education => self.education,
            BlockType::Languages => self.languages,
            BlockType::Summary => self.summary,
        }
    }

    fn with_defaults(max_tokens: u32, seed: u64) -> Self {
        let params = |temperature| GenerationParams {
            temperature,
            max_tokens,
            seed,
        };
        Self {
            projects: params(0.0),
            skills: params(0.0),
            education: params(1.0),
            languages: params(0.0),
            summary: params(0.7),
            segmentation: params(0.5),
        }
    }
}

impl Default for GenerationProfiles {
    fn default() -> Self {
        Self::with_defaults(DEFAULT_MAX_TOKENS, DEFAULT_SEED)
    }
}

/// Immutable settings threaded through every pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Upper bound for one completion call.
    pub request_timeout: Duration,
    /// Maximum simultaneously in-flight completion calls (K).
    pub max_concurrent_requests: usize,
    /// Retries after the first failed attempt (R).
    pub retry_attempts: u32,
    /// Base delay for exponential back-off between attempts.
    pub retry_delay: Duration,
    /// Deadline shared by segmentation and block processing.
    pub pipeline_timeout: Duration,
    pub max_file_size: usize,
    pub page_size_lines: usize,
    pub large_resume_threshold: usize,
    pub generation: GenerationProfiles,
}

const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_SEED: u64 = 42;

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(120),
            max_concurrent_requests: 5,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            pipeline_timeout: Duration::from_secs(300),
            max_file_size: 10 * 1024 * 1024,
            page_size_lines: 50,
            large_resume_threshold: 100,
            generation: GenerationProfiles::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let llm = LlmSettings {
            url: first_env(&["LLM_URL", "LM_STUDIO_URL"])
                .unwrap_or_else(|| "http://localhost:1234/v1/chat/completions".to_string()),
            model: first_env(&["LLM_MODEL", "DEFAULT_MODEL"])
                .unwrap_or_else(|| "google/gemma-3-12b".to_string()),
            api_key: first_env(&["LLM_API_KEY"]).filter(|k| !k.trim().is_empty()),
        };

        Ok(Config {
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            llm,
            pipeline: PipelineConfig::from_env()?,
        })
    }
}

impl PipelineConfig {
    fn from_env() -> Result<Self> {
        let defaults = PipelineConfig::default();

        let max_tokens = env_or("DEFAULT_MAX_TOKENS", DEFAULT_MAX_TOKENS)?;
        let seed = env_or("DEFAULT_SEED", DEFAULT_SEED)?;
        let base = GenerationProfiles::with_defaults(max_tokens, seed);
        let temperature = |key: &str, params: GenerationParams| -> Result<GenerationParams> {
            Ok(GenerationParams {
                temperature: env_or(key, params.temperature)?,
                ..params
            })
        };
        let generation = GenerationProfiles {
            projects: temperature("TEMPERATURE_PROJECTS", base.projects)?,
            skills: temperature("TEMPERATURE_SKILLS", base.skills)?,
            education: temperature("TEMPERATURE_EDUCATION", base.education)?,
            languages: temperature("TEMPERATURE_LANGUAGES", base.languages)?,
            summary: temperature("TEMPERATURE_SUMMARY", base.summary)?,
            segmentation: temperature("TEMPERATURE_SEGMENTATION", base.segmentation)?,
        };

        let config = PipelineConfig {
            request_timeout: Duration::from_secs(env_or(
                "LLM_TIMEOUT",
                defaults.request_timeout.as_secs(),
            )?),
            max_concurrent_requests: env_or(
                "MAX_CONCURRENT_REQUESTS",
                defaults.max_concurrent_requests,
            )?,
            retry_attempts: env_or("RETRY_ATTEMPTS", defaults.retry_attempts)?,
            retry_delay: Duration::from_millis(env_or(
                "RETRY_DELAY_MS",
                defaults.retry_delay.as_millis() as u64,
            )?),
            pipeline_timeout: Duration::from_secs(env_or(
                "PIPELINE_TIMEOUT",
                defaults.pipeline_timeout.as_secs(),
            )?),
            max_file_size: env_or("MAX_FILE_SIZE", defaults.max_file_size)?,
            page_size_lines: env_or("PAGE_SIZE_LINES", defaults.page_size_lines)?,
            large_resume_threshold: env_or(
                "LARGE_RESUME_THRESHOLD",
                defaults.large_resume_threshold,
            )?,
            generation,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_requests == 0 {
            bail!("MAX_CONCURRENT_REQUESTS must be at least 1");
        }
        if self.page_size_lines == 0 {
            bail!("PAGE_SIZE_LINES must be at least 1");
        }
        if self.request_timeout.is_zero() || self.pipeline_timeout.is_zero() {
            bail!("LLM_TIMEOUT and PIPELINE_TIMEOUT must be positive");
        }
        Ok(())
    }
}

fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| std::env::var(key).ok())
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profiles_match_block_types() {
        let profiles = GenerationProfiles::default();
        assert_eq!(profiles.for_block(BlockType::Skills).temperature, 0.0);
        assert_eq!(profiles.for_block(BlockType::Projects).temperature, 0.0);
        assert_eq!(profiles.for_block(BlockType::Summary).temperature, 0.7);
        assert_eq!(profiles.for_block(BlockType::Education).temperature, 1.0);
        assert_eq!(profiles.for_block(BlockType::Languages).seed, 42);
        assert_eq!(profiles.segmentation.max_tokens, 4096);
    }

    #[test]
    fn test_default_pipeline_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent_requests, 5);
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = PipelineConfig {
            max_concurrent_requests: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_or_reports_bad_value() {
        std::env::set_var("RESUME_ANALYZER_TEST_BAD_PORT", "not-a-port");
        let result: Result<u16> = env_or("RESUME_ANALYZER_TEST_BAD_PORT", 8080);
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("RESUME_ANALYZER_TEST_BAD_PORT"), "{message}");
    }

    #[test]
    fn test_env_or_falls_back_to_default() {
        let value: usize = env_or("RESUME_ANALYZER_TEST_UNSET_KEY", 7).unwrap();
        assert_eq!(value, 7);
    }
}
