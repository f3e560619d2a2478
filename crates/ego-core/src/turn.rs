//! Conversation turn controller
//!
//! One turn is a user submit followed by exactly one assistant reply (or a
//! failure/cancellation that appends nothing). At most one turn runs at a time;
//! the phase lives in a watch channel so the UI can follow along.
//!
//! ```text
//! Idle -> UserMessageAppended -> [Thinking] -> AwaitingResponse -> ResponseAppended -> Idle
//! ```

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::backend::{ModelBackend, TurnRequest};
use crate::error::{BackendError, SessionError};
use crate::message::{ChatMessage, ImageRef, MessageId};
use crate::quota::QuotaState;
use crate::services::process_text;
use crate::session::SharedSession;
use crate::timing::{
    Clock, Delay, LatencyWindow, PerformanceStats, RandomDelay, ResponseTimer, SystemClock,
};

const TURN_TIMER: &str = "turn";
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TurnPhase {
    #[default]
    Idle,
    UserMessageAppended,
    Thinking,
    AwaitingResponse,
    ResponseAppended,
}

impl TurnPhase {
    pub fn is_idle(&self) -> bool {
        *self == TurnPhase::Idle
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    EmptyInput,
    QuotaExhausted { reset_at: DateTime<Utc> },
    TurnInFlight,
    InvalidMessage(SessionError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TurnError {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed {
        user: ChatMessage,
        reply: ChatMessage,
        elapsed: Duration,
    },
    /// Nothing changed: no message, no quota.
    Rejected(RejectReason),
    /// The user message stays; no reply was appended.
    Failed { user: ChatMessage, error: TurnError },
    Cancelled { user: ChatMessage },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTiming {
    pub thinking: LatencyWindow,
    pub response_timeout: Duration,
}

impl Default for TurnTiming {
    fn default() -> Self {
        Self {
            thinking: LatencyWindow::thinking(),
            response_timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

pub struct TurnController {
    session: SharedSession,
    quota: Mutex<QuotaState>,
    backend: Arc<dyn ModelBackend>,
    delay: Arc<dyn Delay>,
    clock: Arc<dyn Clock>,
    timing: TurnTiming,
    phase: watch::Sender<TurnPhase>,
    cancel: Mutex<Option<CancellationToken>>,
    timer: Mutex<ResponseTimer>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl TurnController {
    pub fn new(session: SharedSession, quota: QuotaState, backend: Arc<dyn ModelBackend>) -> Self {
        let (phase, _) = watch::channel(TurnPhase::Idle);
        Self {
            session,
            quota: Mutex::new(quota),
            backend,
            delay: Arc::new(RandomDelay),
            clock: Arc::new(SystemClock),
            timing: TurnTiming::default(),
            phase,
            cancel: Mutex::new(None),
            timer: Mutex::new(ResponseTimer::new()),
        }
    }

    pub fn with_delay(mut self, delay: Arc<dyn Delay>) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timing(mut self, timing: TurnTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    pub fn phase(&self) -> TurnPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<TurnPhase> {
        self.phase.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        !self.phase().is_idle()
    }

    /// Current quota, rolled over first if the period has ended.
    pub fn quota(&self) -> QuotaState {
        let mut quota = lock(&self.quota);
        quota.refresh(self.clock.now());
        quota.clone()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn response_stats(&self) -> PerformanceStats {
        lock(&self.timer).stats()
    }

    /// Abort the in-flight turn, if any. Returns whether one was running.
    pub fn cancel(&self) -> bool {
        match lock(&self.cancel).take() {
            Some(token) => {
                info!("cancelling in-flight turn");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Run one turn to completion.
    ///
    /// Dropping the returned future mid-turn releases the turn slot: the
    /// user message and the charged quota stay, nothing else is appended.
    pub async fn submit(&self, input: &str, image: Option<ImageRef>) -> TurnOutcome {
        let processed = process_text(input);
        if processed.text.is_empty() {
            debug!("ignoring empty submit");
            return TurnOutcome::Rejected(RejectReason::EmptyInput);
        }

        let now = self.clock.now();
        let (user, request, mut slot) = match self.begin_turn(processed.text, image, now) {
            Ok(started) => started,
            Err(reason) => {
                debug!(?reason, "submit rejected");
                return TurnOutcome::Rejected(reason);
            }
        };
        info!(
            id = %user.id,
            thinking = request.settings.thinking_mode,
            web_search = request.settings.web_search,
            "turn started"
        );

        let result = tokio::select! {
            _ = slot.token.cancelled() => None,
            result = self.await_reply(&request) => Some(result),
        };

        let outcome = match result {
            Some(Ok(text)) => self.finish_with_reply(user, text),
            Some(Err(error)) => {
                warn!(id = %user.id, %error, "turn failed");
                TurnOutcome::Failed {
                    user,
                    error: error.into(),
                }
            }
            None => {
                info!(id = %user.id, "turn cancelled");
                TurnOutcome::Cancelled { user }
            }
        };

        slot.settled = true;
        drop(slot);
        outcome
    }

    /// Gate, claim the single turn slot, append the user message and charge
    /// the quota. All of it happens under the quota lock.
    fn begin_turn(
        &self,
        text: String,
        image: Option<ImageRef>,
        now: DateTime<Utc>,
    ) -> Result<(ChatMessage, TurnRequest, TurnSlot<'_>), RejectReason> {
        let mut quota = lock(&self.quota);
        quota.refresh(now);
        if !quota.can_send() {
            return Err(RejectReason::QuotaExhausted {
                reset_at: quota.reset_at(),
            });
        }

        let claimed = self.phase.send_if_modified(|phase| {
            if phase.is_idle() {
                *phase = TurnPhase::UserMessageAppended;
                true
            } else {
                false
            }
        });
        if !claimed {
            return Err(RejectReason::TurnInFlight);
        }

        let user = ChatMessage::user(text, image, now);
        let appended = self.session.with(|store| {
            store.add_message(user.clone())?;
            let settings = store.customization();
            if settings.thinking_mode {
                store.set_is_thinking(true);
            }
            Ok::<_, SessionError>(TurnRequest {
                prompt: user.content.clone(),
                model: store.selected_model().cloned(),
                settings,
                image: user.image.clone(),
            })
        });
        let request = match appended {
            Ok(request) => request,
            Err(err) => {
                self.phase.send_replace(TurnPhase::Idle);
                return Err(RejectReason::InvalidMessage(err));
            }
        };

        quota.record_use();
        debug!(
            usage = quota.current_usage(),
            max = quota.max_quota(),
            "quota charged"
        );

        let token = CancellationToken::new();
        *lock(&self.cancel) = Some(token.clone());
        lock(&self.timer).start(user.id.as_str(), TURN_TIMER);

        let slot = TurnSlot {
            controller: self,
            id: user.id.clone(),
            token,
            settled: false,
        };
        Ok((user, request, slot))
    }

    async fn await_reply(&self, request: &TurnRequest) -> Result<String, BackendError> {
        if request.settings.thinking_mode {
            self.phase.send_replace(TurnPhase::Thinking);
            self.delay.pause(self.timing.thinking).await;
        }

        self.phase.send_replace(TurnPhase::AwaitingResponse);
        let limit = self.timing.response_timeout;
        match tokio::time::timeout(limit, self.backend.generate(request)).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout(limit.as_secs())),
        }
    }

    fn finish_with_reply(&self, user: ChatMessage, text: String) -> TurnOutcome {
        let reply = ChatMessage::reply_to(&user, text, self.clock.now());
        let appended = self.session.with(|store| {
            store.set_is_thinking(false);
            store.add_message(reply.clone())
        });
        if let Err(err) = appended {
            return TurnOutcome::Failed {
                user,
                error: err.into(),
            };
        }

        self.phase.send_replace(TurnPhase::ResponseAppended);
        let elapsed = lock(&self.timer)
            .stop(user.id.as_str())
            .unwrap_or_default();
        info!(id = %user.id, ms = elapsed.as_millis() as u64, "turn completed");

        TurnOutcome::Completed {
            user,
            reply,
            elapsed,
        }
    }
}

/// The claimed turn slot. Dropping it hands the controller back to `Idle`,
/// whether the turn finished, the `submit` future was dropped, or the
/// backend panicked.
struct TurnSlot<'a> {
    controller: &'a TurnController,
    id: MessageId,
    token: CancellationToken,
    settled: bool,
}

impl Drop for TurnSlot<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!(id = %self.id, "turn abandoned before it finished");
        }
        let controller = self.controller;
        lock(&controller.timer).discard(self.id.as_str());
        lock(&controller.cancel).take();
        controller
            .session
            .with(|store| store.set_is_thinking(false));
        controller.phase.send_replace(TurnPhase::Idle);
    }
}
