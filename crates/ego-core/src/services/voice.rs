use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::timing::{Delay, LatencyWindow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    pub language: String,
    pub accent: String,
    pub speed: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            accent: "neutral".to_string(),
            speed: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    pub text: String,
    pub language: String,
    pub confidence: f32,
}

/// Simulated speech-to-text.
pub struct VoiceService {
    delay: Arc<dyn Delay>,
    settings: VoiceSettings,
}

impl VoiceService {
    pub fn new(delay: Arc<dyn Delay>, settings: VoiceSettings) -> Self {
        Self { delay, settings }
    }

    pub async fn transcribe(&self, audio: &[u8]) -> Transcription {
        tracing::info!(bytes = audio.len(), "transcribing voice input");
        self.delay.pause(LatencyWindow::new(1_000, 1_000)).await;
        Transcription {
            text: "Voice input detected - this is simulated transcription.".to_string(),
            language: self.settings.language.clone(),
            confidence: 0.95,
        }
    }

    /// Would speak `text` aloud; only logs for now.
    pub fn speak(&self, text: &str) {
        tracing::info!(chars = text.chars().count(), speed = self.settings.speed, "voice output");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::NoDelay;

    #[tokio::test]
    async fn test_transcribe_uses_configured_language() {
        let settings = VoiceSettings {
            language: "es-MX".to_string(),
            ..VoiceSettings::default()
        };
        let voice = VoiceService::new(Arc::new(NoDelay), settings);
        let t = voice.transcribe(&[0u8; 16]).await;
        assert_eq!(t.language, "es-MX");
        assert!(t.text.contains("simulated transcription"));
    }
}
