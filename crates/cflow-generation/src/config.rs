//! Generation engine settings
use cflow_core::{config, CompletionOptions, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Ask the AI provider to write the final text when one is configured
    pub use_ai: bool,
    pub ai_timeout_ms: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Completions shorter than this many words count as empty
    pub min_ai_words: usize,
    /// Samples kept by the quality aggregator
    pub quality_window: usize,
    /// Mean shift between window halves that counts as a trend
    pub trend_delta: f64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            use_ai: true,
            ai_timeout_ms: 30_000,
            max_tokens: 1500,
            temperature: 0.7,
            min_ai_words: 5,
            quality_window: 50,
            trend_delta: 0.05,
        }
    }
}

impl GenerationConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        config::from_yaml(yaml)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        config::load_yaml(path)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_millis(self.ai_timeout_ms)
    }

    pub fn completion_options(&self) -> CompletionOptions {
        CompletionOptions {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}
