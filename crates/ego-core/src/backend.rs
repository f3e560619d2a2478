use async_trait::async_trait;
use std::sync::Arc;

use crate::error::BackendError;
use crate::message::ImageRef;
use crate::model::{AiModel, ModelCatalog};
use crate::services::{
    categorize_input, GenerationOptions, ImageService, InputCategory, SearchService,
};
use crate::settings::{CustomizationSettings, Tone};
use crate::timing::{Delay, LatencyWindow};

/// Everything a backend sees for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub prompt: String,
    pub model: Option<AiModel>,
    pub settings: CustomizationSettings,
    pub image: Option<ImageRef>,
}

#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(&self, request: &TurnRequest) -> Result<String, BackendError>;
}

/// Canned-response backend standing in for a real inference provider.
pub struct SimulatedBackend {
    delay: Arc<dyn Delay>,
    window: LatencyWindow,
    search: Option<Arc<SearchService>>,
    images: Option<Arc<ImageService>>,
}

impl SimulatedBackend {
    pub fn new(delay: Arc<dyn Delay>, window: LatencyWindow) -> Self {
        Self {
            delay,
            window,
            search: None,
            images: None,
        }
    }

    pub fn with_search(mut self, search: Arc<SearchService>) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_images(mut self, images: Arc<ImageService>) -> Self {
        self.images = Some(images);
        self
    }

    fn tone_opener(tone: Tone) -> &'static str {
        match tone {
            Tone::Professional => "I'll provide a thorough, professional analysis.",
            Tone::Casual => "Hey there! Let me break this down for you.",
            Tone::Creative => "What an interesting question! Let me explore this creatively.",
            Tone::Technical => "From a technical perspective, here's the detailed breakdown:",
            Tone::Friendly => "Great question! I'm happy to help you with this.",
        }
    }
}

/// "generate an image of ...", "create a picture ..."
fn wants_image(prompt: &str) -> bool {
    let lower = prompt.to_lowercase();
    categorize_input(prompt) == InputCategory::Command
        && ["image", "picture", "drawing"].iter().any(|w| lower.contains(w))
}

#[async_trait]
impl ModelBackend for SimulatedBackend {
    async fn generate(&self, request: &TurnRequest) -> Result<String, BackendError> {
        if let Some(model) = &request.model {
            if !ModelCatalog::contains(&model.id) {
                return Err(BackendError::UnknownModel(model.id.clone()));
            }
        }
        let model_name = request
            .model
            .as_ref()
            .map(|m| m.name.as_str())
            .unwrap_or("default model");
        tracing::info!(model = model_name, tone = request.settings.tone.as_str(), "generating response");

        self.delay.pause(self.window).await;

        let settings = &request.settings;
        let mut response = Self::tone_opener(settings.tone).to_string();

        if settings.verbosity > 50 {
            response.push_str("\n\nLet me provide additional context and detailed explanations to give you a comprehensive understanding of this topic.");
        }

        if settings.web_search {
            match &self.search {
                Some(search) => {
                    let results = search
                        .search(&request.prompt, crate::services::search::DEFAULT_MAX_RESULTS)
                        .await;
                    response.push_str("\n\n");
                    response.push_str(&search.summarize(&results).await);
                    response.push_str("\n**Related:** ");
                    response.push_str(&search.related_queries(&request.prompt).join(" | "));
                }
                None => response.push_str("\n\n[Web search results included]"),
            }
        }

        if let Some(image) = &request.image {
            response.push_str("\n\nI can see the image you've shared.");
            if let Some(images) = &self.images {
                let analysis = images.analyze(image).await;
                response.push(' ');
                response.push_str(&analysis.description);
            }
        }

        if let Some(images) = self.images.as_ref().filter(|_| wants_image(&request.prompt)) {
            let generated = images
                .generate(&request.prompt, GenerationOptions::default())
                .await;
            response.push_str(&format!(
                "\n\n**Generated image:** {}\n{}",
                generated.image.as_str(),
                generated.revised_prompt
            ));
        }

        if settings.thinking_mode {
            response.push_str("\n\n[Deep analysis performed]");
        }

        response.push_str(&format!(
            "\n\nResponse from {} to: {}\n\n**Model:** {}\n**Temperature:** {:.1}\n**Thinking Mode:** {}",
            model_name,
            request.prompt,
            model_name,
            settings.temperature,
            if settings.thinking_mode { "Enabled" } else { "Disabled" }
        ));

        Ok(response)
    }
}
