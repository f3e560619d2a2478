use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Free,
    Premium,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Free => "free",
            ModelTier::Premium => "premium",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelTier::Free => "Free",
            ModelTier::Premium => "Premium",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiModel {
    pub id: String,
    pub name: String,
    pub tier: ModelTier,
    pub quota_used: u32,
    pub quota_limit: u32,
}

impl AiModel {
    fn new(id: &str, name: &str, tier: ModelTier, quota_used: u32, quota_limit: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            tier,
            quota_used,
            quota_limit,
        }
    }

    pub fn is_premium(&self) -> bool {
        self.tier == ModelTier::Premium
    }

    /// Share of the model's weekly quota already used, 0-100.
    pub fn quota_percentage(&self) -> f64 {
        if self.quota_limit == 0 {
            return 0.0;
        }
        (self.quota_used as f64 / self.quota_limit as f64 * 100.0).min(100.0)
    }
}

/// What the user is feeding the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Text,
    Image,
    Voice,
    Multimodal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskCategory {
    General,
    Technical,
    Creative,
    Analysis,
}

/// Static model catalog shown in the model picker.
pub struct ModelCatalog;

impl ModelCatalog {
    pub fn free_models() -> Vec<AiModel> {
        vec![
            AiModel::new("gpt-3.5", "GPT-3.5 Turbo", ModelTier::Free, 0, 0),
            AiModel::new("claude-instant", "Claude Instant", ModelTier::Free, 0, 0),
            AiModel::new("llama-7b", "Llama 2 7B", ModelTier::Free, 0, 0),
            AiModel::new("mistral-7b", "Mistral 7B", ModelTier::Free, 0, 0),
            AiModel::new("falcon-7b", "Falcon 7B", ModelTier::Free, 0, 0),
        ]
    }

    pub fn premium_models() -> Vec<AiModel> {
        vec![
            AiModel::new("gpt-4", "GPT-4 Turbo", ModelTier::Premium, 3, 7),
            AiModel::new("claude-3-opus", "Claude 3 Opus", ModelTier::Premium, 1, 7),
            AiModel::new("gemini-pro", "Gemini Pro", ModelTier::Premium, 5, 7),
            AiModel::new("llama-70b", "Llama 2 70B", ModelTier::Premium, 2, 7),
            AiModel::new("claude-3-sonnet", "Claude 3 Sonnet", ModelTier::Premium, 0, 7),
        ]
    }

    /// Free models first, then premium.
    pub fn all() -> Vec<AiModel> {
        let mut models = Self::free_models();
        models.extend(Self::premium_models());
        models
    }

    pub fn find(id: &str) -> Option<AiModel> {
        Self::all().into_iter().find(|m| m.id == id)
    }

    pub fn contains(id: &str) -> bool {
        Self::all().iter().any(|m| m.id == id)
    }

    /// Preferred model for an input kind and task category.
    pub fn recommend(_kind: InputKind, category: TaskCategory) -> AiModel {
        // Every input kind currently shares one preference table.
        let id = match category {
            TaskCategory::General | TaskCategory::Analysis => "gpt-4",
            TaskCategory::Technical => "claude-3-opus",
            TaskCategory::Creative => "gemini-pro",
        };
        Self::find(id).unwrap_or_else(|| Self::premium_models().remove(0))
    }
}
