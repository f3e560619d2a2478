use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::message::ImageRef;
use crate::timing::{Delay, LatencyWindow};

const GENERATION_HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStyle {
    #[default]
    Photorealistic,
    Artistic,
    Cartoon,
    Abstract,
}

impl ImageStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageStyle::Photorealistic => "photorealistic",
            ImageStyle::Artistic => "artistic",
            ImageStyle::Cartoon => "cartoon",
            ImageStyle::Abstract => "abstract",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub style: ImageStyle,
    pub size: String,
    pub model: String,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            style: ImageStyle::default(),
            size: "1024x1024".to_string(),
            model: "dall-e-3".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub image: ImageRef,
    pub prompt: String,
    pub revised_prompt: String,
    pub options: GenerationOptions,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedObject {
    pub name: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageAnalysis {
    pub description: String,
    pub objects: Vec<DetectedObject>,
    /// (hex color, percentage)
    pub colors: Vec<(String, u8)>,
    pub text: Option<String>,
}

/// Simulated image analysis and generation.
pub struct ImageService {
    delay: Arc<dyn Delay>,
    history: Mutex<VecDeque<String>>,
}

impl ImageService {
    pub fn new(delay: Arc<dyn Delay>) -> Self {
        Self {
            delay,
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn analyze(&self, image: &ImageRef) -> ImageAnalysis {
        tracing::info!(image = image.as_str(), "analyzing image");
        self.delay.pause(LatencyWindow::new(2_000, 2_000)).await;

        ImageAnalysis {
            description: "This is a simulated image analysis. Real computer vision integration pending API configuration.".to_string(),
            objects: vec![
                DetectedObject { name: "object1".to_string(), confidence: 0.95 },
                DetectedObject { name: "object2".to_string(), confidence: 0.87 },
            ],
            colors: vec![
                ("#4ade80".to_string(), 35),
                ("#ffffff".to_string(), 45),
                ("#1f2937".to_string(), 20),
            ],
            text: Some("Simulated OCR text extraction".to_string()),
        }
    }

    pub async fn generate(&self, prompt: &str, options: GenerationOptions) -> GeneratedImage {
        tracing::info!(prompt, model = %options.model, "generating image");
        {
            let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
            history.push_back(prompt.to_string());
            while history.len() > GENERATION_HISTORY_LIMIT {
                history.pop_front();
            }
        }

        self.delay.pause(LatencyWindow::new(3_000, 8_000)).await;

        GeneratedImage {
            image: ImageRef::new(format!(
                "https://via.placeholder.com/{}/4ade80/ffffff?text=Generated+Image",
                options.size
            )),
            prompt: prompt.to_string(),
            revised_prompt: format!("Enhanced prompt: {} with improved artistic detail", prompt),
            options,
        }
    }

    /// Past generation prompts, newest first.
    pub fn history(&self) -> Vec<String> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.iter().rev().cloned().collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}
