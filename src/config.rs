use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::embedding::DEFAULT_MODEL_ID;
use crate::error::{PipelineError, Result};
use crate::headings::HeadingRules;
use crate::rank::DEFAULT_TOP_K;
use crate::report::DEFAULT_TITLE_MAX_CHARS;
use crate::sections::DEFAULT_CONTEXT_LINES;

/// Settings for one batch run. Every field has a default, so a config file
/// only needs the keys it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,
    #[serde(default)]
    pub heading: HeadingRules,
    /// Baseline tolerance (in points) for merging text runs into one line.
    #[serde(default = "default_line_join_threshold")]
    pub line_join_threshold: f32,
    #[serde(default = "default_model_id")]
    pub model_id: String,
    #[serde(default = "default_max_seq_len")]
    pub max_seq_len: usize,
    #[serde(default = "default_embed_timeout_secs")]
    pub embed_timeout_secs: u64,
    #[serde(default = "default_input_file_name")]
    pub input_file_name: String,
    #[serde(default = "default_output_file_name")]
    pub output_file_name: String,
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,
}

fn default_top_k() -> usize {
    DEFAULT_TOP_K
}

fn default_context_lines() -> usize {
    DEFAULT_CONTEXT_LINES
}

fn default_title_max_chars() -> usize {
    DEFAULT_TITLE_MAX_CHARS
}

fn default_line_join_threshold() -> f32 {
    5.0
}

fn default_model_id() -> String {
    DEFAULT_MODEL_ID.to_string()
}

fn default_max_seq_len() -> usize {
    512
}

fn default_embed_timeout_secs() -> u64 {
    120
}

fn default_input_file_name() -> String {
    "challenge1b_input.json".to_string()
}

fn default_output_file_name() -> String {
    "challenge1b_output.json".to_string()
}

fn default_collection_prefix() -> String {
    "collection".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            context_lines: default_context_lines(),
            title_max_chars: default_title_max_chars(),
            heading: HeadingRules::default(),
            line_join_threshold: default_line_join_threshold(),
            model_id: default_model_id(),
            max_seq_len: default_max_seq_len(),
            embed_timeout_secs: default_embed_timeout_secs(),
            input_file_name: default_input_file_name(),
            output_file_name: default_output_file_name(),
            collection_prefix: default_collection_prefix(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            PipelineError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(PipelineError::InvalidConfig("top_k must be at least 1".into()));
        }
        if !(self.heading.large_font_ratio > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "heading.large_font_ratio must be positive, got {}",
                self.heading.large_font_ratio
            )));
        }
        if self.heading.min_chars >= self.heading.max_chars {
            return Err(PipelineError::InvalidConfig(format!(
                "heading.min_chars ({}) must be below heading.max_chars ({})",
                self.heading.min_chars, self.heading.max_chars
            )));
        }
        if !(self.line_join_threshold >= 0.0) {
            return Err(PipelineError::InvalidConfig(
                "line_join_threshold must be non-negative".into(),
            ));
        }
        if self.embed_timeout_secs == 0 {
            return Err(PipelineError::InvalidConfig(
                "embed_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Ranking query built from a persona role and a task.
pub fn build_query(role: &str, task: &str) -> String {
    format!("{role}. {task}")
}
