//! In-memory conversation state for one session
//!
//! The store is the single source of truth read by the UI and written by the
//! turn controller. Setters replace a field wholesale and do not validate.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::SessionError;
use crate::message::ChatMessage;
use crate::model::AiModel;
use crate::settings::{CustomizationSettings, InputMode};

#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    messages: Vec<ChatMessage>,
    selected_model: Option<AiModel>,
    input_mode: InputMode,
    customization: CustomizationSettings,
    is_thinking: bool,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_customization(customization: CustomizationSettings) -> Self {
        Self {
            customization,
            ..Self::default()
        }
    }

    /// Append a message. Existing entries are never touched.
    pub fn add_message(&mut self, message: ChatMessage) -> Result<(), SessionError> {
        if message.id.is_empty() {
            return Err(SessionError::EmptyMessageId);
        }
        self.messages.push(message);
        Ok(())
    }

    pub fn set_selected_model(&mut self, model: Option<AiModel>) {
        self.selected_model = model;
    }

    pub fn set_input_mode(&mut self, mode: InputMode) {
        self.input_mode = mode;
    }

    pub fn update_customization(&mut self, settings: CustomizationSettings) {
        self.customization = settings;
    }

    pub fn set_is_thinking(&mut self, thinking: bool) {
        self.is_thinking = thinking;
    }

    pub fn clear_history(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn selected_model(&self) -> Option<&AiModel> {
        self.selected_model.as_ref()
    }

    pub fn input_mode(&self) -> InputMode {
        self.input_mode
    }

    pub fn customization(&self) -> CustomizationSettings {
        self.customization
    }

    pub fn is_thinking(&self) -> bool {
        self.is_thinking
    }
}

/// Cloneable handle to a session store shared between the UI and the controller.
///
/// Locks are short and never held across an `.await`.
#[derive(Debug, Clone, Default)]
pub struct SharedSession {
    inner: Arc<Mutex<SessionStore>>,
}

impl SharedSession {
    pub fn new(store: SessionStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, SessionStore> {
        // A panic while holding the lock cannot leave the store half-written:
        // every mutation is a single push or assignment.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with the store locked.
    pub fn with<R>(&self, f: impl FnOnce(&mut SessionStore) -> R) -> R {
        f(&mut self.lock())
    }
}
