pub mod backend;
pub mod config;
pub mod error;
pub mod message;
pub mod model;
pub mod quota;
pub mod services;
pub mod session;
pub mod settings;
pub mod timing;
pub mod turn;

// Re-export main types for convenience
pub use backend::{ModelBackend, SimulatedBackend, TurnRequest};
pub use config::Config;
pub use error::{BackendError, ConfigError, SessionError};
pub use message::{ChatMessage, ChatRole, ImageRef, MessageId};
pub use model::{AiModel, InputKind, ModelCatalog, ModelTier, TaskCategory};
pub use quota::{QuotaState, DEFAULT_WEEKLY_QUOTA};
pub use session::{SessionStore, SharedSession};
pub use settings::{ChatMode, CustomizationSettings, InputMode, Tone};
pub use timing::{Clock, Delay, LatencyWindow, NoDelay, RandomDelay, SystemClock};
pub use turn::{RejectReason, TurnController, TurnError, TurnOutcome, TurnPhase, TurnTiming};
