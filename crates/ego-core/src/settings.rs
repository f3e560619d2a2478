use serde::{Deserialize, Serialize};

pub const MIN_VERBOSITY: u8 = 10;
pub const MAX_VERBOSITY: u8 = 100;
pub const VERBOSITY_STEP: u8 = 10;
pub const MAX_TEMPERATURE: f32 = 2.0;
pub const TEMPERATURE_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Creative,
    Technical,
    Friendly,
}

impl Tone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tone::Professional => "professional",
            Tone::Casual => "casual",
            Tone::Creative => "creative",
            Tone::Technical => "technical",
            Tone::Friendly => "friendly",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "professional" => Some(Tone::Professional),
            "casual" => Some(Tone::Casual),
            "creative" => Some(Tone::Creative),
            "technical" => Some(Tone::Technical),
            "friendly" => Some(Tone::Friendly),
            _ => None,
        }
    }

    pub fn all() -> Vec<Tone> {
        vec![
            Tone::Professional,
            Tone::Casual,
            Tone::Creative,
            Tone::Technical,
            Tone::Friendly,
        ]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Tone::Professional => "Professional",
            Tone::Casual => "Casual",
            Tone::Creative => "Creative",
            Tone::Technical => "Technical",
            Tone::Friendly => "Friendly",
        }
    }

    /// The tone after this one, wrapping around.
    pub fn next(&self) -> Tone {
        let all = Tone::all();
        let i = all.iter().position(|t| t == self).unwrap_or(0);
        all[(i + 1) % all.len()]
    }
}

/// Which capture surface feeds the input box.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputMode {
    #[default]
    Text,
    Image,
    Voice,
}

impl InputMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            InputMode::Text => "Text",
            InputMode::Image => "Image",
            InputMode::Voice => "Voice",
        }
    }

    pub fn next(&self) -> InputMode {
        match self {
            InputMode::Text => InputMode::Image,
            InputMode::Image => InputMode::Voice,
            InputMode::Voice => InputMode::Text,
        }
    }
}

/// Quick mode switch: at most one of thinking and web search is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatMode {
    #[default]
    Normal,
    Think,
    Search,
}

impl ChatMode {
    pub fn display_name(&self) -> &'static str {
        match self {
            ChatMode::Normal => "Normal",
            ChatMode::Think => "Think",
            ChatMode::Search => "Search",
        }
    }

    pub fn next(&self) -> ChatMode {
        match self {
            ChatMode::Normal => ChatMode::Think,
            ChatMode::Think => ChatMode::Search,
            ChatMode::Search => ChatMode::Normal,
        }
    }
}

/// Response customization, replaced as a whole on every update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomizationSettings {
    pub tone: Tone,
    /// 10..=100 in steps of 10.
    pub verbosity: u8,
    pub thinking_mode: bool,
    pub web_search: bool,
    /// 0.0..=2.0
    pub temperature: f32,
}

impl Default for CustomizationSettings {
    fn default() -> Self {
        Self {
            tone: Tone::Professional,
            verbosity: 50,
            thinking_mode: false,
            web_search: false,
            temperature: 0.7,
        }
    }
}

impl CustomizationSettings {
    pub fn with_tone(self, tone: Tone) -> Self {
        Self { tone, ..self }
    }

    /// Snap to the nearest step and clamp into range.
    pub fn with_verbosity(self, verbosity: i32) -> Self {
        let step = VERBOSITY_STEP as i32;
        let snapped = ((verbosity + step / 2) / step) * step;
        let verbosity = snapped.clamp(MIN_VERBOSITY as i32, MAX_VERBOSITY as i32) as u8;
        Self { verbosity, ..self }
    }

    pub fn with_temperature(self, temperature: f32) -> Self {
        let snapped = (temperature / TEMPERATURE_STEP).round() * TEMPERATURE_STEP;
        let temperature = if snapped.is_finite() {
            snapped.clamp(0.0, MAX_TEMPERATURE)
        } else {
            self.temperature
        };
        Self { temperature, ..self }
    }

    pub fn with_thinking_mode(self, thinking_mode: bool) -> Self {
        Self { thinking_mode, ..self }
    }

    pub fn with_web_search(self, web_search: bool) -> Self {
        Self { web_search, ..self }
    }

    pub fn with_chat_mode(self, mode: ChatMode) -> Self {
        Self {
            thinking_mode: mode == ChatMode::Think,
            web_search: mode == ChatMode::Search,
            ..self
        }
    }

    /// The quick mode these settings correspond to. Both toggles on reads as Think.
    pub fn chat_mode(&self) -> ChatMode {
        if self.thinking_mode {
            ChatMode::Think
        } else if self.web_search {
            ChatMode::Search
        } else {
            ChatMode::Normal
        }
    }
}
