//! Orchestrator settings and the aggregated Contentflow configuration
use cflow_classifier::ClassifierConfig;
use cflow_core::{config, Priority, Result};
use cflow_generation::GenerationConfig;
use cflow_monitor::MonitorConfig;
use cflow_validator::ValidationProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Approval SLA per request priority, in hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaTable {
    pub urgent: u32,
    pub high: u32,
    pub normal: u32,
    pub low: u32,
}

impl Default for SlaTable {
    fn default() -> Self {
        Self {
            urgent: 4,
            high: 24,
            normal: 48,
            low: 96,
        }
    }
}

impl SlaTable {
    pub fn hours(&self, priority: Priority) -> u32 {
        match priority {
            Priority::Urgent => self.urgent,
            Priority::High => self.high,
            Priority::Normal => self.normal,
            Priority::Low => self.low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Parallel runs in a batch while the pipeline is open
    pub max_concurrency: usize,
    /// Allow the single enhancement pass on content that fails validation
    pub enhancement_enabled: bool,
    /// Ask the AI provider for a revision during enhancement
    pub ai_enhancement: bool,
    pub validation_cache_ttl_secs: u64,
    /// Minimum tag confidence used when deriving insights
    pub insight_threshold: f64,
    /// Extra template files loaded next to the built-in set
    pub template_files: Vec<PathBuf>,
    pub sla_hours: SlaTable,
    /// Samples kept for the validation quality average
    pub quality_window: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            enhancement_enabled: true,
            ai_enhancement: true,
            validation_cache_ttl_secs: 300,
            insight_threshold: 0.5,
            template_files: Vec::new(),
            sla_hours: SlaTable::default(),
            quality_window: 50,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        config::from_yaml(yaml)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        config::load_yaml(path)
    }

    pub fn validation_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.validation_cache_ttl_secs)
    }
}

/// Every component's settings in one YAML document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentflowConfig {
    pub validation: ValidationProfile,
    pub classifier: ClassifierConfig,
    pub generation: GenerationConfig,
    pub orchestrator: OrchestratorConfig,
    pub monitor: MonitorConfig,
}

impl ContentflowConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        config::from_yaml(yaml)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        config::load_yaml(path)
    }
}
