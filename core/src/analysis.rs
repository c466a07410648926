//! Post-submission analysis: similar tickets, a generated suggestion and a
//! predicted module/priority, merged into one result.

use crate::live::LiveSearcher;
use crate::service::SimilarIssue;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Reference to an attachment supplied with the description (file name, URL or id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef(pub String);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub description: String,
    #[serde(default)]
    pub image: Option<ImageRef>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub predicted_module: String,
    pub predicted_priority: String,
    pub similar_issues: Vec<SimilarIssue>,
    pub ai_suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub module: String,
    pub priority: String,
}

/// Produces formatted prose for a description. Opaque to the retrieval core.
#[async_trait]
pub trait SuggestionGenerator: Send + Sync {
    async fn suggest(&self, description: &str, image: Option<&ImageRef>) -> anyhow::Result<String>;
}

/// Predicts module and priority for a description.
#[async_trait]
pub trait TriageClassifier: Send + Sync {
    async fn classify(&self, description: &str, similar: &[SimilarIssue]) -> anyhow::Result<Prediction>;
}

pub struct Analyzer {
    searcher: LiveSearcher,
    suggester: Arc<dyn SuggestionGenerator>,
    classifier: Arc<dyn TriageClassifier>,
}

impl Analyzer {
    pub fn new(searcher: LiveSearcher, suggester: Arc<dyn SuggestionGenerator>, classifier: Arc<dyn TriageClassifier>) -> Self {
        Self { searcher, suggester, classifier }
    }

    /// Never fails: retrieval, generation and classification each degrade on error.
    pub async fn analyze(&self, req: AnalysisRequest) -> AnalysisResult {
        let service = Arc::clone(self.searcher.service());
        let k = service.config().analysis_k;
        let description = req.description.clone();
        let similar_issues = match tokio::task::spawn_blocking(move || service.similar_issues(&description, k)).await {
            Ok(Ok(issues)) => issues,
            Ok(Err(e)) => {
                tracing::info!(error = %e, "similar issues unavailable for analysis");
                Vec::new()
            }
            Err(e) => {
                tracing::error!(error = %e, "similar issue search task failed");
                Vec::new()
            }
        };

        let ai_suggestion = match self.suggester.suggest(&req.description, req.image.as_ref()).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "suggestion generator failed");
                String::new()
            }
        };

        let cfg = self.searcher.service().config();
        let (predicted_module, predicted_priority) = match (req.module, req.priority) {
            (Some(m), Some(p)) => (m, p),
            (module, priority) => {
                let predicted = self.classifier.classify(&req.description, &similar_issues).await.unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "classifier failed, using defaults");
                    Prediction { module: cfg.default_module.clone(), priority: cfg.default_priority.clone() }
                });
                (module.unwrap_or(predicted.module), priority.unwrap_or(predicted.priority))
            }
        };

        AnalysisResult { predicted_module, predicted_priority, similar_issues, ai_suggestion }
    }
}

/// Keyword-triggered markdown suggestions with a generic fallback.
pub struct CannedSuggester {
    rules: Vec<(String, String)>,
    fallback: String,
}

const PASSWORD_STEPS: &str = "### Recommended Solution: Password Reset

1. **Open the self-service portal** at `https://reset.company.com`.
2. **Enter your username** (your company email address).
3. **Follow the on-screen instructions** to verify your identity and set a new password.
4. **Test the new password** by signing in to a service such as email.

Your VPN password is the same as your network password.
";

const GENERIC_STEPS: &str = "### Suggested Steps

1. **Restart your computer** to clear temporary glitches.
2. **Check your connections**: power, monitor and network cables.
3. **Search the knowledge base** for keywords from your issue.
4. **Reinstall the application** from the Software Center if one program is affected.
";

impl Default for CannedSuggester {
    fn default() -> Self {
        Self { rules: vec![("password".into(), PASSWORD_STEPS.into())], fallback: GENERIC_STEPS.into() }
    }
}

impl CannedSuggester {
    pub fn new(rules: Vec<(String, String)>, fallback: String) -> Self {
        let rules = rules.into_iter().map(|(k, v)| (k.to_lowercase(), v)).collect();
        Self { rules, fallback }
    }
}

#[async_trait]
impl SuggestionGenerator for CannedSuggester {
    async fn suggest(&self, description: &str, image: Option<&ImageRef>) -> anyhow::Result<String> {
        let lower = description.to_lowercase();
        let mut text = self
            .rules
            .iter()
            .find(|(kw, _)| lower.contains(kw.as_str()))
            .map(|(_, body)| body.clone())
            .unwrap_or_else(|| self.fallback.clone());
        if let Some(ImageRef(name)) = image {
            text.push_str(&format!("\n_Attached image `{name}` was included for context._\n"));
        }
        Ok(text)
    }
}

/// Score-weighted vote over the category and priority of retrieved tickets.
pub struct NeighborClassifier {
    default_module: String,
    default_priority: String,
}

impl NeighborClassifier {
    pub fn new(default_module: impl Into<String>, default_priority: impl Into<String>) -> Self {
        Self { default_module: default_module.into(), default_priority: default_priority.into() }
    }
}

fn vote<'a>(labels: impl Iterator<Item = (&'a str, f32)>) -> Option<String> {
    let mut tally: HashMap<&str, f32> = HashMap::new();
    for (label, w) in labels {
        *tally.entry(label).or_insert(0.0) += w;
    }
    tally
        .into_iter()
        .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(a.0)))
        .map(|(label, _)| label.to_string())
}

#[async_trait]
impl TriageClassifier for NeighborClassifier {
    async fn classify(&self, _description: &str, similar: &[SimilarIssue]) -> anyhow::Result<Prediction> {
        let module = vote(similar.iter().filter_map(|s| s.category.as_deref().map(|c| (c, s.similarity_score))))
            .unwrap_or_else(|| self.default_module.clone());
        let priority = vote(similar.iter().filter_map(|s| s.priority.as_deref().map(|p| (p, s.similarity_score))))
            .unwrap_or_else(|| self.default_priority.clone());
        Ok(Prediction { module, priority })
    }
}
