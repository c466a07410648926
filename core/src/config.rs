use serde::{Deserialize, Serialize};
use std::path::Path;

/// Term-weighting scheme used by the scorer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "lowercase")]
pub enum Weighting {
    /// Cosine over log-scaled TF-IDF vectors; scores fall in [0, 1].
    TfIdf,
    Bm25 {
        #[serde(default = "default_k1")]
        k1: f32,
        #[serde(default = "default_b")]
        b: f32,
    },
}

impl Default for Weighting {
    fn default() -> Self { Weighting::TfIdf }
}

impl Weighting {
    pub fn bm25() -> Self { Weighting::Bm25 { k1: default_k1(), b: default_b() } }
}

fn default_k1() -> f32 { 1.2 }
fn default_b() -> f32 { 0.75 }

/// Index build options.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Weight of a solution-text occurrence relative to a description occurrence.
    pub solution_weight: f32,
    pub stemming: bool,
}

impl Default for IndexConfig {
    fn default() -> Self { Self { solution_weight: 0.5, stemming: false } }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub index: IndexConfig,
    pub weighting: Weighting,
    /// Normalized queries with fewer tokens return no results.
    pub min_query_tokens: usize,
    /// Raw whitespace words required before a live search is issued.
    pub live_min_words: usize,
    pub live_k: usize,
    pub analysis_k: usize,
    pub max_query_chars: usize,
    /// Live-search quiescence window in milliseconds.
    pub debounce_ms: u64,
    pub default_module: String,
    pub default_priority: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            index: IndexConfig::default(),
            weighting: Weighting::default(),
            min_query_tokens: 2,
            live_min_words: 10,
            live_k: 3,
            analysis_k: 4,
            max_query_chars: 10_000,
            debounce_ms: 400,
            default_module: "Software Installation".into(),
            default_priority: "High".into(),
        }
    }
}

impl SearchConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let cfg: SearchConfig = serde_json::from_str(&text)?;
        Ok(cfg)
    }
}
