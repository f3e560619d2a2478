use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ego_core::services::input::{validate_file_size, validate_file_type};
use ego_core::services::{categorize_input, Transcription, VoiceService};
use ego_core::{
    AiModel, ChatMessage, Config, CustomizationSettings, ImageRef, InputKind, InputMode,
    ModelCatalog, QuotaState, RejectReason, SharedSession, TurnController, TurnOutcome,
};
use ratatui::layout::Rect;
use ratatui::widgets::ListState;
use tokio::task::JoinHandle;
use tokio::time::Instant;

const IMAGE_TYPES: &[&str] = &["image/*"];
const MAX_IMAGE_MB: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub edit_mode: EditMode,
    pub controller: Arc<TurnController>,
    pub voice: Arc<VoiceService>,

    // Input box
    pub input: String,
    pub cursor: usize, // cursor position in chars, not bytes
    pub pending_image: Option<ImageRef>,

    // Chat view
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the chat block, set during render
    pub chat_width: u16,
    pub chat_area: Option<Rect>,
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Background work
    pub turn_task: Option<JoinHandle<TurnOutcome>>,
    pub voice_task: Option<JoinHandle<Transcription>>,
    pub turn_started: Option<Instant>,
    pub last_response: Option<Duration>,

    // Popups
    pub show_model_picker: bool,
    pub available_models: Vec<AiModel>,
    pub model_picker_state: ListState,
    pub show_upgrade_notice: bool,

    // Session chrome
    pub username: Option<String>,
    pub voice_output: bool,
    pub status: Option<String>,
    pub quota: QuotaState,

    // Preferences as stored on disk; `None` path means nothing is written
    pub config: Config,
    pub config_path: Option<PathBuf>,
}

impl App {
    pub fn new(
        controller: Arc<TurnController>,
        voice: Arc<VoiceService>,
        config: Config,
        config_path: Option<PathBuf>,
    ) -> Self {
        let quota = controller.quota();
        Self {
            should_quit: false,
            edit_mode: EditMode::Normal,
            controller,
            voice,

            input: String::new(),
            cursor: 0,
            pending_image: None,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,
            chat_area: None,
            animation_frame: 0,

            turn_task: None,
            voice_task: None,
            turn_started: None,
            last_response: None,

            show_model_picker: false,
            available_models: Vec::new(),
            model_picker_state: ListState::default(),
            show_upgrade_notice: false,

            username: None,
            voice_output: config.voice_output,
            status: None,
            quota,

            config,
            config_path,
        }
    }

    pub fn session(&self) -> &SharedSession {
        self.controller.session()
    }

    pub fn is_busy(&self) -> bool {
        self.turn_task.is_some()
    }

    /// Elapsed time of the in-flight turn.
    pub fn response_elapsed(&self) -> Option<Duration> {
        self.turn_started.map(|started| started.elapsed())
    }

    /// Tick animation frame and refresh the quota snapshot (called by Tick event)
    pub fn tick(&mut self) {
        if self.is_busy() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        self.quota = self.controller.quota();
    }

    /// Send the input box as a new turn. In image mode the first Enter
    /// attaches the typed path instead.
    pub fn submit_input(&mut self) {
        if self.is_busy() {
            self.status = Some("Wait for the current response to finish".to_string());
            return;
        }

        let input_mode = self.session().lock().input_mode();
        if input_mode == InputMode::Image && self.pending_image.is_none() {
            self.attach_image();
            return;
        }

        if self.input.trim().is_empty() {
            return;
        }

        self.quota = self.controller.quota();
        if self.quota.is_limit_reached() {
            self.status = Some("Weekly message limit reached".to_string());
            return;
        }

        let text = std::mem::take(&mut self.input);
        self.cursor = 0;
        let image = self.pending_image.take();
        self.edit_mode = EditMode::Normal;
        self.status = None;
        self.turn_started = Some(Instant::now());

        let controller = self.controller.clone();
        self.turn_task = Some(tokio::spawn(async move { controller.submit(&text, image).await }));

        // Scroll to bottom so "Thinking..." is visible
        self.scroll_to_bottom();
    }

    fn attach_image(&mut self) {
        let path = self.input.trim().to_string();
        if path.is_empty() {
            self.status = Some("Type an image path and press Enter to attach it".to_string());
            return;
        }
        if !validate_file_type(guess_mime(&path), IMAGE_TYPES) {
            self.status = Some(format!("Not a supported image: {}", path));
            return;
        }
        if let Ok(meta) = std::fs::metadata(&path) {
            if !validate_file_size(meta.len(), MAX_IMAGE_MB) {
                self.status = Some(format!("Image is larger than {} MB", MAX_IMAGE_MB));
                return;
            }
        }

        tracing::info!(path = %path, "image attached");
        self.pending_image = Some(ImageRef::new(path.clone()));
        self.input.clear();
        self.cursor = 0;
        self.status = Some(format!("Attached {}. Now type your prompt", path));
    }

    /// Collect finished background tasks.
    pub async fn poll_tasks(&mut self) {
        if self.turn_task.as_ref().is_some_and(|task| task.is_finished()) {
            if let Some(task) = self.turn_task.take() {
                match task.await {
                    Ok(outcome) => self.finish_turn(outcome),
                    Err(err) => {
                        tracing::error!(%err, "turn task panicked");
                        self.turn_started = None;
                        self.status = Some(format!("Error: {}", err));
                    }
                }
            }
        }

        if self.voice_task.as_ref().is_some_and(|task| task.is_finished()) {
            if let Some(task) = self.voice_task.take() {
                match task.await {
                    Ok(transcription) => self.append_transcription(&transcription),
                    Err(err) => self.status = Some(format!("Voice input failed: {}", err)),
                }
            }
        }
    }

    pub fn finish_turn(&mut self, outcome: TurnOutcome) {
        self.turn_started = None;
        self.quota = self.controller.quota();

        match outcome {
            TurnOutcome::Completed { reply, elapsed, .. } => {
                self.last_response = Some(elapsed);
                if self.voice_output {
                    self.voice.speak(&reply.content);
                }
            }
            TurnOutcome::Rejected(RejectReason::EmptyInput) => {}
            TurnOutcome::Rejected(RejectReason::QuotaExhausted { reset_at }) => {
                self.status = Some(format!(
                    "Weekly message limit reached. Resets {}",
                    reset_at.format("%a %b %-d, %H:%M UTC")
                ));
            }
            TurnOutcome::Rejected(RejectReason::TurnInFlight) => {
                self.status = Some("A response is already in progress".to_string());
            }
            TurnOutcome::Rejected(RejectReason::InvalidMessage(err)) => {
                self.status = Some(format!("Error: {}", err));
            }
            TurnOutcome::Failed { error, .. } => {
                self.status = Some(format!("Error: {}", error));
            }
            TurnOutcome::Cancelled { .. } => {
                self.status = Some("Response cancelled".to_string());
            }
        }

        self.scroll_to_bottom();
    }

    pub fn cancel_turn(&mut self) {
        if self.controller.cancel() {
            self.status = Some("Cancelling...".to_string());
        }
    }

    // Voice
    pub fn start_voice_input(&mut self) {
        if self.voice_task.is_some() {
            return;
        }
        self.session().with(|store| store.set_input_mode(InputMode::Voice));
        self.status = Some("Listening...".to_string());
        let voice = self.voice.clone();
        self.voice_task = Some(tokio::spawn(async move { voice.transcribe(&[]).await }));
    }

    fn append_transcription(&mut self, transcription: &Transcription) {
        if !self.input.is_empty() && !self.input.ends_with(' ') {
            self.input.push(' ');
        }
        self.input.push_str(&transcription.text);
        self.cursor = self.input.chars().count();
        self.status = Some(format!(
            "Transcribed ({}, {:.0}% confidence)",
            transcription.language,
            transcription.confidence * 100.0
        ));
    }

    pub fn toggle_voice_output(&mut self) {
        self.voice_output = !self.voice_output;
        self.config.voice_output = self.voice_output;
        self.persist();
    }

    // Customization
    fn update_settings(&mut self, change: impl FnOnce(CustomizationSettings) -> CustomizationSettings) {
        let settings = self.session().with(|store| {
            let settings = change(store.customization());
            store.update_customization(settings);
            settings
        });
        self.config.customization = settings;
        self.persist();
    }

    pub fn cycle_tone(&mut self) {
        self.update_settings(|s| s.with_tone(s.tone.next()));
    }

    pub fn adjust_verbosity(&mut self, delta: i32) {
        self.update_settings(|s| s.with_verbosity(s.verbosity as i32 + delta));
    }

    pub fn adjust_temperature(&mut self, delta: f32) {
        self.update_settings(|s| s.with_temperature(s.temperature + delta));
    }

    pub fn cycle_chat_mode(&mut self) {
        self.update_settings(|s| s.with_chat_mode(s.chat_mode().next()));
    }

    pub fn toggle_thinking(&mut self) {
        self.update_settings(|s| s.with_thinking_mode(!s.thinking_mode));
    }

    pub fn toggle_web_search(&mut self) {
        self.update_settings(|s| s.with_web_search(!s.web_search));
    }

    pub fn cycle_input_mode(&mut self) {
        let mode = self.session().with(|store| {
            let mode = store.input_mode().next();
            store.set_input_mode(mode);
            mode
        });
        if mode != InputMode::Image {
            self.pending_image = None;
        }
        self.status = Some(match mode {
            InputMode::Text => "Text input".to_string(),
            InputMode::Image => "Image input: type a path and press Enter to attach".to_string(),
            InputMode::Voice => "Voice input: press r to record".to_string(),
        });
    }

    pub fn clear_history(&mut self) {
        if self.is_busy() {
            self.status = Some("Wait for the current response to finish".to_string());
            return;
        }
        self.session().with(|store| store.clear_history());
        self.chat_scroll = 0;
        self.status = Some("Conversation cleared".to_string());
    }

    /// Demo login: only sets a display name.
    pub fn toggle_login(&mut self) {
        match self.username.take() {
            Some(name) => {
                tracing::info!(user = %name, "logged out");
                self.status = Some("Logged out".to_string());
            }
            None => {
                let name = std::env::var("USER").unwrap_or_else(|_| "guest".to_string());
                tracing::info!(user = %name, "logged in");
                self.status = Some(format!("Logged in as {}", name));
                self.username = Some(name);
            }
        }
    }

    // Model picker
    pub fn open_model_picker(&mut self) {
        self.available_models = ModelCatalog::all();
        let selected = self.session().lock().selected_model().map(|m| m.id.clone());
        let current_idx = selected
            .and_then(|id| self.available_models.iter().position(|m| m.id == id))
            .unwrap_or(0);
        self.model_picker_state.select(Some(current_idx));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = self.available_models.len();
        if len > 0 {
            let i = self.model_picker_state.selected().unwrap_or(0);
            self.model_picker_state.select(Some((i + 1).min(len - 1)));
        }
    }

    pub fn model_picker_nav_up(&mut self) {
        let i = self.model_picker_state.selected().unwrap_or(0);
        self.model_picker_state.select(Some(i.saturating_sub(1)));
    }

    pub fn select_model(&mut self) {
        if let Some(model) = self
            .model_picker_state
            .selected()
            .and_then(|i| self.available_models.get(i))
            .cloned()
        {
            self.set_model(model);
        }
        self.show_model_picker = false;
    }

    /// Pick a model from the input kind and what the draft asks for.
    pub fn auto_select_model(&mut self) {
        let input_mode = self.session().lock().input_mode();
        let kind = match (input_mode, self.pending_image.is_some()) {
            (_, true) if !self.input.trim().is_empty() => InputKind::Multimodal,
            (InputMode::Image, _) => InputKind::Image,
            (InputMode::Voice, _) => InputKind::Voice,
            (InputMode::Text, _) => InputKind::Text,
        };
        let category = categorize_input(&self.input).task_category();
        let model = ModelCatalog::recommend(kind, category);
        self.status = Some(format!("Auto-selected {}", model.name));
        self.set_model(model);
    }

    fn set_model(&mut self, model: AiModel) {
        tracing::info!(model = %model.id, "model selected");
        self.config.default_model = Some(model.id.clone());
        self.session().with(|store| store.set_selected_model(Some(model)));
        self.persist();
    }

    fn persist(&mut self) {
        let Some(path) = &self.config_path else {
            return;
        };
        if let Err(err) = self.config.save_to(path) {
            tracing::warn!(%err, "failed to save config");
            self.status = Some(format!("Could not save settings: {}", err));
        }
    }

    // Chat scrolling
    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
    }

    /// Scroll chat so the last message (or the "Thinking..." line) is visible
    pub fn scroll_to_bottom(&mut self) {
        let messages = self.session().lock().messages().to_vec();
        let mut total_lines = chat_line_count(&messages, self.wrap_width());
        if self.is_busy() {
            total_lines += 2; // "Ego:" + "Thinking..."
        }

        let visible_height = if self.chat_height > 0 { self.chat_height } else { 20 };
        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }

    fn wrap_width(&self) -> usize {
        if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        }
    }
}

/// Rendered height of the chat history at a given wrap width.
pub fn chat_line_count(messages: &[ChatMessage], wrap_width: usize) -> u16 {
    let wrap_width = wrap_width.max(1);
    let mut total_lines: u16 = 0;
    for msg in messages {
        total_lines = total_lines.saturating_add(1); // Role line
        if msg.image.is_some() {
            total_lines = total_lines.saturating_add(1);
        }
        for line in msg.content.lines() {
            let char_count = line.chars().count();
            let wrapped = if char_count == 0 { 1 } else { char_count / wrap_width + 1 };
            total_lines = total_lines.saturating_add(wrapped as u16);
        }
        total_lines = total_lines.saturating_add(1); // Blank line after message
    }
    total_lines
}

fn guess_mime(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
pub(crate) fn test_app(usage: u32, max: u32) -> App {
    use chrono::Utc;
    use ego_core::services::VoiceSettings;
    use ego_core::{LatencyWindow, NoDelay, SessionStore, SimulatedBackend};

    let backend = SimulatedBackend::new(Arc::new(NoDelay), LatencyWindow::response());
    let controller = TurnController::new(
        SharedSession::new(SessionStore::new()),
        QuotaState::new(max, Utc::now()).with_usage(usage),
        Arc::new(backend),
    )
    .with_delay(Arc::new(NoDelay));
    let voice = VoiceService::new(Arc::new(NoDelay), VoiceSettings::default());
    App::new(Arc::new(controller), Arc::new(voice), Config::new(), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ego_core::{ChatRole, Tone};

    async fn wait_for_turn(app: &mut App) {
        let task = app.turn_task.take().expect("turn in flight");
        let outcome = task.await.unwrap();
        app.finish_turn(outcome);
    }

    #[tokio::test]
    async fn test_submit_runs_a_turn() {
        let mut app = test_app(0, 7);
        app.input = "hello".to_string();
        app.cursor = 5;
        app.submit_input();

        assert!(app.is_busy());
        assert!(app.input.is_empty());
        assert_eq!(app.cursor, 0);

        wait_for_turn(&mut app).await;
        assert!(!app.is_busy());
        assert_eq!(app.quota.current_usage(), 1);
        assert!(app.last_response.is_some());
        let store = app.session().lock();
        assert_eq!(store.len(), 2);
        assert_eq!(store.messages()[1].role, ChatRole::Assistant);
    }

    #[tokio::test]
    async fn test_submit_blank_input_does_nothing() {
        let mut app = test_app(0, 7);
        app.input = "   ".to_string();
        app.submit_input();
        assert!(!app.is_busy());
        assert!(app.session().lock().is_empty());
    }

    #[tokio::test]
    async fn test_submit_at_limit_keeps_draft() {
        let mut app = test_app(7, 7);
        app.input = "hello".to_string();
        app.submit_input();
        assert!(!app.is_busy());
        assert_eq!(app.input, "hello");
        assert!(app.status.as_deref().unwrap_or_default().contains("limit"));
    }

    #[tokio::test]
    async fn test_image_mode_attaches_then_sends() {
        let mut app = test_app(0, 7);
        app.session().with(|s| s.set_input_mode(InputMode::Image));

        app.input = "notes.txt".to_string();
        app.submit_input();
        assert!(app.pending_image.is_none());
        assert!(app.status.as_deref().unwrap_or_default().contains("Not a supported image"));

        app.input = "photos/cat.PNG".to_string();
        app.submit_input();
        assert_eq!(app.pending_image, Some(ImageRef::new("photos/cat.PNG")));
        assert!(!app.is_busy());

        app.input = "what is this?".to_string();
        app.submit_input();
        wait_for_turn(&mut app).await;
        assert!(app.pending_image.is_none());
        let store = app.session().lock();
        assert_eq!(store.messages()[0].image, Some(ImageRef::new("photos/cat.PNG")));
    }

    #[tokio::test]
    async fn test_settings_changes_reach_the_store() {
        let mut app = test_app(0, 7);
        app.cycle_tone();
        app.adjust_verbosity(10);
        app.adjust_temperature(0.1);
        app.toggle_web_search();

        let settings = app.session().lock().customization();
        assert_eq!(settings.tone, Tone::Casual);
        assert_eq!(settings.verbosity, 60);
        assert!((settings.temperature - 0.8).abs() < 1e-4);
        assert!(settings.web_search);
        assert_eq!(app.config.customization, settings);
    }

    #[tokio::test]
    async fn test_chat_mode_cycles_toggles() {
        let mut app = test_app(0, 7);
        app.cycle_chat_mode();
        let settings = app.session().lock().customization();
        assert!(settings.thinking_mode && !settings.web_search);
        app.cycle_chat_mode();
        let settings = app.session().lock().customization();
        assert!(!settings.thinking_mode && settings.web_search);
    }

    #[tokio::test]
    async fn test_auto_select_uses_draft_category() {
        let mut app = test_app(0, 7);
        app.input = "create a poem".to_string();
        app.auto_select_model();
        assert_eq!(app.session().lock().selected_model().unwrap().id, "gemini-pro");
        assert_eq!(app.config.default_model.as_deref(), Some("gemini-pro"));
    }

    #[tokio::test]
    async fn test_model_picker_selects_highlighted_model() {
        let mut app = test_app(0, 7);
        app.open_model_picker();
        assert!(app.show_model_picker);
        assert_eq!(app.model_picker_state.selected(), Some(0));
        app.model_picker_nav_down();
        app.select_model();
        assert!(!app.show_model_picker);
        assert_eq!(
            app.session().lock().selected_model().map(|m| m.id.clone()),
            Some("claude-instant".to_string())
        );
    }

    #[tokio::test]
    async fn test_voice_input_appends_transcription() {
        let mut app = test_app(0, 7);
        app.input = "Note:".to_string();
        app.start_voice_input();
        assert_eq!(app.session().lock().input_mode(), InputMode::Voice);

        let task = app.voice_task.take().unwrap();
        let transcription = task.await.unwrap();
        app.append_transcription(&transcription);
        assert!(app.input.starts_with("Note: Voice input detected"));
        assert_eq!(app.cursor, app.input.chars().count());
    }

    #[tokio::test]
    async fn test_login_toggle() {
        let mut app = test_app(0, 7);
        app.toggle_login();
        assert!(app.username.is_some());
        app.toggle_login();
        assert!(app.username.is_none());
    }

    #[tokio::test]
    async fn test_persist_writes_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut app = test_app(0, 7);
        app.config_path = Some(path.clone());

        app.toggle_voice_output();
        let saved = Config::load_from(&path).unwrap();
        assert!(saved.voice_output);
    }

    #[test]
    fn test_chat_line_count_wraps() {
        let now = chrono::Utc::now();
        let user = ChatMessage::user("a".repeat(120), None, now);
        // role + 3 wrapped lines + blank
        assert_eq!(chat_line_count(&[user], 50), 5);
    }

    #[test]
    fn test_guess_mime() {
        assert_eq!(guess_mime("a/b.JPG"), "image/jpeg");
        assert_eq!(guess_mime("noext"), "application/octet-stream");
    }
}
