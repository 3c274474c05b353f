use crate::models::{AnalysisOptions, WindowConfig};
use crate::retry::CallPolicy;
use crate::services::gemini::{DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
use crate::services::groq::{DEFAULT_GROQ_BASE_URL, DEFAULT_GROQ_MODEL};
use crate::services::huggingface::{DEFAULT_HF_BASE_URL, DEFAULT_HF_EMBEDDING_MODEL};
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    /// Absent keys disable the provider.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub groq: ProviderConfig,
    pub gemini: ProviderConfig,
    pub huggingface: ProviderConfig,
    pub windows: WindowConfig,
    pub analysis: AnalysisOptions,
    pub policy: CallPolicy,
    pub top_k: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            groq: ProviderConfig {
                base_url: DEFAULT_GROQ_BASE_URL.to_string(),
                model: DEFAULT_GROQ_MODEL.to_string(),
                api_key: None,
            },
            gemini: ProviderConfig {
                base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
                model: DEFAULT_GEMINI_MODEL.to_string(),
                api_key: None,
            },
            huggingface: ProviderConfig {
                base_url: DEFAULT_HF_BASE_URL.to_string(),
                model: DEFAULT_HF_EMBEDDING_MODEL.to_string(),
                api_key: None,
            },
            windows: WindowConfig::default(),
            analysis: AnalysisOptions::default(),
            policy: CallPolicy::default(),
            top_k: 4,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&std::env::vars().collect())
    }

    /// Overlays the recognised variables in `vars` onto the defaults. Blank
    /// values count as unset.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let lookup = |key: &str| {
            vars.get(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let mut config = Self::default();

        config.groq.api_key = lookup("GROQ_API_KEY");
        config.gemini.api_key = lookup("GEMINI_API_KEY");
        config.huggingface.api_key = lookup("HF_API_TOKEN");

        if let Some(model) = lookup("GROQ_MODEL") {
            config.groq.model = model;
        }
        if let Some(model) = lookup("GEMINI_MODEL") {
            config.gemini.model = model;
        }
        if let Some(model) = lookup("HF_EMBEDDING_MODEL") {
            config.huggingface.model = model;
        }

        if let Some(value) = lookup("ANALYSIS_SINGLE_PASS_THRESHOLD") {
            config.analysis.single_pass_threshold =
                parse("ANALYSIS_SINGLE_PASS_THRESHOLD", &value)?;
        }
        if let Some(value) = lookup("ANALYSIS_CHUNK_CHARS") {
            config.analysis.chunk_max_chars = positive("ANALYSIS_CHUNK_CHARS", &value)?;
        }
        if let Some(value) = lookup("ANALYSIS_CONCURRENCY") {
            config.analysis.concurrency = positive("ANALYSIS_CONCURRENCY", &value)?;
        }
        if let Some(value) = lookup("CONTEXT_WINDOW_CHARS") {
            config.windows.size = positive("CONTEXT_WINDOW_CHARS", &value)?;
        }
        if let Some(value) = lookup("CONTEXT_WINDOW_OVERLAP") {
            config.windows.overlap = parse("CONTEXT_WINDOW_OVERLAP", &value)?;
        }
        if let Some(value) = lookup("CONTEXT_TOP_K") {
            config.top_k = positive("CONTEXT_TOP_K", &value)?;
        }
        if let Some(value) = lookup("LLM_TIMEOUT_SECS") {
            config.policy.timeout = Duration::from_secs(positive("LLM_TIMEOUT_SECS", &value)?);
        }
        if let Some(value) = lookup("LLM_MAX_RETRIES") {
            config.policy.max_retries = parse("LLM_MAX_RETRIES", &value)?;
        }

        if config.windows.overlap >= config.windows.size {
            return Err(ConfigError::Invalid {
                key: "CONTEXT_WINDOW_OVERLAP".to_string(),
                value: config.windows.overlap.to_string(),
            });
        }

        Ok(config)
    }

    pub fn require_key(provider: &ProviderConfig, variable: &str) -> Result<String, ConfigError> {
        provider
            .api_key
            .clone()
            .ok_or_else(|| ConfigError::Missing(variable.to_string()))
    }
}

fn parse<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn positive<T: FromStr + Default + PartialEq>(key: &str, value: &str) -> Result<T, ConfigError> {
    let parsed: T = parse(key, value)?;
    if parsed == T::default() {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
        });
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_without_variables() {
        let config = PipelineConfig::from_vars(&HashMap::new()).expect("defaults are valid");

        assert_eq!(config.windows, WindowConfig { size: 1_000, overlap: 200 });
        assert_eq!(config.analysis.single_pass_threshold, 5_000);
        assert_eq!(config.analysis.chunk_max_chars, 6_000);
        assert!(config.groq.api_key.is_none());
    }

    #[test]
    fn variables_override_defaults() {
        let config = PipelineConfig::from_vars(&vars(&[
            ("GROQ_API_KEY", " gsk_123 "),
            ("HF_API_TOKEN", ""),
            ("ANALYSIS_CONCURRENCY", "3"),
            ("LLM_TIMEOUT_SECS", "15"),
        ]))
        .expect("valid overrides");

        assert_eq!(config.groq.api_key.as_deref(), Some("gsk_123"));
        assert!(config.huggingface.api_key.is_none());
        assert_eq!(config.analysis.concurrency, 3);
        assert_eq!(config.policy.timeout, Duration::from_secs(15));
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let result = PipelineConfig::from_vars(&vars(&[("CONTEXT_TOP_K", "many")]));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));

        let result = PipelineConfig::from_vars(&vars(&[("ANALYSIS_CHUNK_CHARS", "0")]));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        let result = PipelineConfig::from_vars(&vars(&[("CONTEXT_WINDOW_OVERLAP", "1000")]));
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn api_keys_are_not_serialized() {
        let config =
            PipelineConfig::from_vars(&vars(&[("GROQ_API_KEY", "secret")])).expect("valid");
        let encoded = serde_json::to_string(&config).expect("serializes");
        assert!(!encoded.contains("secret"));
    }
}
