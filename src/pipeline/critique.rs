use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{CRITIQUE_FALLBACK_PREFIX, CRITIQUE_SYSTEM_PROMPT};
use crate::pipeline::error::ModelError;
use crate::pipeline::traits::{CritiqueRequest, LanguageModel};
use crate::pipeline::types::{AnalysisResult, Tag};

pub const MAX_PROMPT_TAGS: usize = 5;
const TAG_SEPARATOR: &str = "、";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CritiqueSettings {
    pub max_tokens: u32,
    pub top_p: f32,
}

impl Default for CritiqueSettings {
    fn default() -> Self {
        Self {
            max_tokens: 800,
            top_p: 0.95,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Critique {
    pub text: String,
    /// Set when the model call failed and `text` is the fallback notice.
    pub degraded: bool,
}

/// Sentence naming up to [`MAX_PROMPT_TAGS`] detected subjects, in the order
/// the vision service returned them.
pub fn describe_tags(tags: &[Tag]) -> Option<String> {
    let names: Vec<&str> = tags
        .iter()
        .take(MAX_PROMPT_TAGS)
        .map(|tag| tag.name.trim())
        .filter(|name| !name.is_empty())
        .collect();
    if names.is_empty() {
        return None;
    }
    Some(format!("這張照片偵測到的主體有{}。", names.join(TAG_SEPARATOR)))
}

pub fn build_critique_prompt(analysis: &AnalysisResult) -> String {
    let clause = describe_tags(&analysis.tags).unwrap_or_default();
    CRITIQUE_SYSTEM_PROMPT.replace("{photo_tags}", &clause)
}

pub fn fallback_critique(err: &ModelError) -> String {
    format!("{CRITIQUE_FALLBACK_PREFIX}{err}")
}

pub struct CritiqueComposer {
    model: Arc<dyn LanguageModel>,
    settings: CritiqueSettings,
}

impl CritiqueComposer {
    pub fn new(model: Arc<dyn LanguageModel>, settings: CritiqueSettings) -> Self {
        Self { model, settings }
    }

    pub fn build_request(&self, analysis: &AnalysisResult, image_ref: &str) -> CritiqueRequest {
        CritiqueRequest {
            system_prompt: build_critique_prompt(analysis),
            image_ref: image_ref.to_string(),
            max_tokens: self.settings.max_tokens,
            top_p: self.settings.top_p,
        }
    }

    /// Never fails: a model error turns into the fallback notice.
    pub async fn compose(&self, analysis: &AnalysisResult, image_ref: &str) -> Critique {
        let request = self.build_request(analysis, image_ref);
        match self.model.generate_critique(&request).await {
            Ok(text) => {
                info!("Critique generated ({} chars)", text.chars().count());
                Critique {
                    text,
                    degraded: false,
                }
            }
            Err(err) => {
                warn!("Critique generation failed; using fallback: {}", err);
                Critique {
                    text: fallback_critique(&err),
                    degraded: true,
                }
            }
        }
    }
}
