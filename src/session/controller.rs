// src/session/controller.rs

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{Mutex, broadcast, broadcast::error::RecvError};
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    backend::MockTestBackend,
    config::SessionSettings,
    error::AppError,
    models::{
        question::PublicQuestion,
        session::{LeaveDecision, SessionView},
    },
    session::{
        eligibility::{self, Eligibility},
        guard::{GuardOutcome, PageSignal, SignalCallback, SignalKind},
        machine::{Session, SubmitTrigger},
        review::QuestionReview,
        timer::{TickOutcome, Ticker},
    },
};

const EVENT_CAPACITY: usize = 64;

/// Notifications pushed to subscribers of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    Started { time_left: u32 },
    Tick { time_left: u32 },
    TimeExpired,
    Warning { kind: SignalKind },
    Submitted { score: u32, total: u32 },
    SubmitFailed { error: String },
    Closed,
}

/// Async owner of one mock test session.
///
/// Wraps the synchronous [`Session`] in a mutex, drives its countdown from a [`Ticker`]
/// task, and performs the backend calls. Dropping the controller aborts the ticker.
pub struct SessionController {
    id: Uuid,
    session: Arc<Mutex<Session>>,
    backend: Arc<dyn MockTestBackend>,
    ticker: Mutex<Option<Ticker>>,
    /// Part of the current second already spent when the countdown was paused.
    paused_phase: Mutex<Duration>,
    last_seen: Mutex<Instant>,
    events: broadcast::Sender<SessionEvent>,
    settings: SessionSettings,
}

impl SessionController {
    /// Fetches the question set and the user's history concurrently and prepares a session.
    ///
    /// A failed question fetch is fatal. A failed or impossible history lookup is not:
    /// the session is created but may not be started.
    pub async fn load(
        backend: Arc<dyn MockTestBackend>,
        user_id: Option<String>,
        settings: SessionSettings,
        now: DateTime<Utc>,
    ) -> Result<Self, AppError> {
        let history = async {
            match user_id.as_deref() {
                Some(id) => Some(backend.fetch_history(id).await),
                None => None,
            }
        };
        let (questions, history) = tokio::join!(backend.fetch_questions(), history);

        let questions = questions.map_err(|e| {
            tracing::error!("Failed to fetch questions: {}", e);
            AppError::Upstream("Failed to load questions".to_string())
        })?;

        let eligibility = match history {
            None => Eligibility::unauthenticated(),
            Some(Ok(records)) => eligibility::evaluate(&records, now, settings.cooldown_days),
            Some(Err(e)) => {
                tracing::warn!("Failed to fetch test history, blocking start: {}", e);
                Eligibility::history_unavailable()
            }
        };

        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let sink = events.clone();
        let on_warning: SignalCallback = Arc::new(move |kind| {
            let _ = sink.send(SessionEvent::Warning { kind });
        });

        let id = Uuid::new_v4();
        tracing::info!(
            session = %id,
            questions = questions.len(),
            eligible = eligibility.eligible,
            "Session loaded"
        );

        let session = Session::new(
            user_id,
            questions,
            eligibility,
            settings.duration_secs,
            Some(on_warning),
        );

        Ok(Self {
            id,
            session: Arc::new(Mutex::new(session)),
            backend,
            ticker: Mutex::new(None),
            paused_phase: Mutex::new(Duration::ZERO),
            last_seen: Mutex::new(Instant::now()),
            events,
            settings,
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Waits up to `wait` for the next event. `None` on timeout.
    pub async fn next_event(&self, wait: Duration) -> Result<Option<SessionEvent>, AppError> {
        let mut rx = self.subscribe();
        if self.is_closed().await {
            return Err(AppError::NotFound("Session has been closed".to_string()));
        }

        let next = async {
            loop {
                match rx.recv().await {
                    Ok(event) => return Ok(event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(session = %self.id, skipped, "Event subscriber lagged");
                    }
                    Err(RecvError::Closed) => {
                        return Err(AppError::NotFound("Session has been closed".to_string()));
                    }
                }
            }
        };

        match tokio::time::timeout(wait, next).await {
            Ok(event) => event.map(Some),
            Err(_) => Ok(None),
        }
    }

    /// Records client activity for idle eviction.
    pub async fn touch(&self) {
        *self.last_seen.lock().await = Instant::now();
    }

    pub async fn idle_for(&self) -> Duration {
        self.last_seen.lock().await.elapsed()
    }

    pub async fn is_closed(&self) -> bool {
        self.session.lock().await.is_closed()
    }

    pub async fn view(&self) -> SessionView {
        self.session.lock().await.view(self.id)
    }

    pub async fn eligibility(&self) -> Eligibility {
        self.session.lock().await.eligibility().clone()
    }

    pub async fn public_questions(&self) -> Vec<PublicQuestion> {
        self.session
            .lock()
            .await
            .questions()
            .iter()
            .map(PublicQuestion::from)
            .collect()
    }

    pub async fn start(&self) -> Result<SessionView, AppError> {
        let time_left = {
            let mut session = self.session.lock().await;
            session.start()?;
            session.time_left()
        };
        self.start_ticker(Duration::ZERO).await;
        let _ = self.events.send(SessionEvent::Started { time_left });
        tracing::info!(session = %self.id, "Mock test started");

        Ok(self.view().await)
    }

    pub async fn answer(&self, question_id: &str, option: &str) -> Result<SessionView, AppError> {
        let mut session = self.session.lock().await;
        session.answer(question_id, option)?;
        Ok(session.view(self.id))
    }

    /// Manual "Submit Test" click. A second request while a prompt is open is ignored.
    pub async fn request_submit(&self) -> Result<SessionView, AppError> {
        let opened = self
            .session
            .lock()
            .await
            .request_submit(SubmitTrigger::Manual)?;
        if opened {
            let phase = self.stop_ticker().await;
            *self.paused_phase.lock().await = phase;
        }
        Ok(self.view().await)
    }

    /// Closes a manual prompt and resumes the countdown mid-second where it paused.
    pub async fn cancel_submit(&self) -> Result<SessionView, AppError> {
        self.session.lock().await.cancel_submit()?;
        let phase = std::mem::take(&mut *self.paused_phase.lock().await);
        self.start_ticker(phase).await;
        Ok(self.view().await)
    }

    /// Confirms the open prompt: scores, posts the result, and finalizes on success.
    ///
    /// The session lock is released while the request is in flight; the prompt's in-flight
    /// flag keeps a concurrent confirmation from sending a second payload.
    pub async fn confirm_submit(&self, now: DateTime<Utc>) -> Result<u32, AppError> {
        let payload = self.session.lock().await.begin_submit(now)?;

        let outcome = self.backend.submit_result(&payload).await;
        let result = self.session.lock().await.finish_submit(&payload, outcome);

        match &result {
            Ok(score) => {
                self.stop_ticker().await;
                let _ = self.events.send(SessionEvent::Submitted {
                    score: *score,
                    total: payload.total_marks,
                });
                tracing::info!(session = %self.id, score, "Mock test submitted");
            }
            Err(e) => {
                let _ = self.events.send(SessionEvent::SubmitFailed {
                    error: e.message().to_string(),
                });
                tracing::warn!(session = %self.id, "Submission failed: {}", e);
            }
        }
        result
    }

    pub async fn signal(&self, signal: PageSignal) -> Result<GuardOutcome, AppError> {
        self.session.lock().await.handle_signal(signal)
    }

    pub async fn return_to_test(&self) -> Result<SessionView, AppError> {
        let mut session = self.session.lock().await;
        session.return_to_test()?;
        Ok(session.view(self.id))
    }

    /// Leave click. A running test asks for confirmation; otherwise the session is torn down.
    pub async fn request_leave(&self) -> Result<LeaveDecision, AppError> {
        let decision = self.session.lock().await.request_leave()?;
        if decision == LeaveDecision::Left {
            self.teardown().await?;
        }
        Ok(decision)
    }

    pub async fn stay(&self) -> Result<SessionView, AppError> {
        let mut session = self.session.lock().await;
        session.stay()?;
        Ok(session.view(self.id))
    }

    /// Abandons the session without submitting and stops the countdown.
    pub async fn teardown(&self) -> Result<(), AppError> {
        self.session.lock().await.close()?;
        self.stop_ticker().await;
        let _ = self.events.send(SessionEvent::Closed);
        tracing::info!(session = %self.id, "Session torn down");
        Ok(())
    }

    pub async fn review(&self) -> Result<Vec<QuestionReview>, AppError> {
        self.session.lock().await.review()
    }

    pub async fn is_ticking(&self) -> bool {
        let running = self
            .ticker
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.is_finished());
        running && self.session.lock().await.is_ticking()
    }

    async fn start_ticker(&self, elapsed: Duration) {
        let session = self.session.clone();
        let events = self.events.clone();
        let id = self.id;

        let ticker = Ticker::resume(self.settings.tick_interval, elapsed, move || {
            let session = session.clone();
            let events = events.clone();
            async move {
                let outcome = session.lock().await.tick();
                match outcome {
                    TickOutcome::Ticked(time_left) => {
                        let _ = events.send(SessionEvent::Tick { time_left });
                        ControlFlow::Continue(())
                    }
                    TickOutcome::Expired => {
                        tracing::info!(session = %id, "Time is up");
                        let _ = events.send(SessionEvent::Tick { time_left: 0 });
                        let _ = events.send(SessionEvent::TimeExpired);
                        ControlFlow::Break(())
                    }
                    TickOutcome::Idle => ControlFlow::Break(()),
                }
            }
        });

        // Replacing an old ticker drops it, which aborts its task.
        *self.ticker.lock().await = Some(ticker);
    }

    /// Returns how far into the current second the countdown was.
    async fn stop_ticker(&self) -> Duration {
        self.ticker
            .lock()
            .await
            .take()
            .map(Ticker::stop)
            .unwrap_or_default()
    }
}
