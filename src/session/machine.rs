// src/session/machine.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        question::Question,
        session::{LeaveDecision, PromptView, SessionView},
        test_record::SubmissionPayload,
    },
    session::{
        eligibility::Eligibility,
        guard::{GuardOutcome, LeaveGuard, PageSignal, SignalCallback, SignalKind},
        review::{AnswerMap, QuestionReview, build_review, count_correct},
        timer::{Countdown, TickOutcome},
    },
    utils::format::{format_date, format_time},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    NotStarted,
    InProgress,
    Submitted,
}

/// What opened the submission confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitTrigger {
    Manual,
    TimeExpired,
}

#[derive(Debug, Clone)]
pub struct SubmitPrompt {
    pub trigger: SubmitTrigger,
    /// A submission request is out to the backend.
    pub in_flight: bool,
    /// Last submission failure, shown inside the dialog.
    pub error: Option<String>,
}

impl SubmitPrompt {
    fn new(trigger: SubmitTrigger) -> Self {
        Self {
            trigger,
            in_flight: false,
            error: None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self.trigger {
            SubmitTrigger::Manual => "Confirm Submission",
            SubmitTrigger::TimeExpired => "Time is up!",
        }
    }

    pub fn message(&self) -> &'static str {
        match self.trigger {
            SubmitTrigger::Manual => "Are you sure you want to submit your test?",
            SubmitTrigger::TimeExpired => {
                "Your test time has ended. Would you like to submit your answers now?"
            }
        }
    }

    pub fn can_cancel(&self) -> bool {
        self.trigger == SubmitTrigger::Manual && !self.in_flight
    }
}

/// One timed mock test. Owns the answers, the countdown, the leave guard and the score.
///
/// All transitions are synchronous; the async controller drives `tick` from a timer task
/// and performs the network call between `begin_submit` and `finish_submit`.
#[derive(Debug)]
pub struct Session {
    user_id: Option<String>,
    questions: Vec<Question>,
    eligibility: Eligibility,
    state: SessionState,
    answers: AnswerMap,
    countdown: Countdown,
    prompt: Option<SubmitPrompt>,
    leave_prompt: bool,
    guard: LeaveGuard,
    score: Option<u32>,
    closed: bool,
}

impl Session {
    pub fn new(
        user_id: Option<String>,
        questions: Vec<Question>,
        eligibility: Eligibility,
        duration_secs: u32,
        on_warning: Option<SignalCallback>,
    ) -> Self {
        Self {
            user_id,
            questions,
            eligibility,
            state: SessionState::NotStarted,
            answers: AnswerMap::new(),
            countdown: Countdown::new(duration_secs),
            prompt: None,
            leave_prompt: false,
            guard: LeaveGuard::new(on_warning),
            score: None,
            closed: false,
        }
    }

    fn ensure_open(&self) -> Result<(), AppError> {
        if self.closed {
            return Err(AppError::NotFound("Session has been closed".to_string()));
        }
        Ok(())
    }

    fn ensure_in_progress(&self) -> Result<(), AppError> {
        self.ensure_open()?;
        match self.state {
            SessionState::InProgress => Ok(()),
            SessionState::NotStarted => Err(AppError::Conflict("Test has not started".to_string())),
            SessionState::Submitted => {
                Err(AppError::Conflict("Test has already been submitted".to_string()))
            }
        }
    }

    pub fn start(&mut self) -> Result<(), AppError> {
        self.ensure_open()?;
        if self.state != SessionState::NotStarted {
            return Err(AppError::Conflict("Test has already started".to_string()));
        }
        if !self.eligibility.eligible {
            let msg = match self.eligibility.next_available {
                Some(at) => format!(
                    "You can only take one mock test per week. Next available on {}",
                    format_date(at)
                ),
                None => "You are not allowed to start a mock test right now".to_string(),
            };
            return Err(AppError::Forbidden(msg));
        }
        if self.questions.is_empty() {
            return Err(AppError::Conflict("No questions are available".to_string()));
        }

        self.answers.clear();
        self.countdown.reset();
        self.countdown.resume();
        self.state = SessionState::InProgress;
        self.guard.activate();
        Ok(())
    }

    pub fn answer(&mut self, question_id: &str, option: &str) -> Result<(), AppError> {
        self.ensure_in_progress()?;
        if self.prompt.is_some() {
            return Err(AppError::Conflict(
                "Answers are locked while submission is pending".to_string(),
            ));
        }

        let question = self
            .questions
            .iter()
            .find(|q| q.id == question_id)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown question '{}'", question_id)))?;

        if !question.has_option(option) {
            return Err(AppError::BadRequest(format!(
                "Option '{}' is not valid for question '{}'",
                option, question_id
            )));
        }

        self.answers
            .insert(question_id.to_string(), option.to_string());
        Ok(())
    }

    /// Advances the countdown by one second. A no-op unless the test is running with no
    /// confirmation showing. On expiry the time-up confirmation opens.
    pub fn tick(&mut self) -> TickOutcome {
        if self.closed || self.state != SessionState::InProgress || self.prompt.is_some() {
            return TickOutcome::Idle;
        }

        let outcome = self.countdown.tick();
        if outcome == TickOutcome::Expired {
            self.open_prompt(SubmitTrigger::TimeExpired);
        }
        outcome
    }

    /// Opens the submission confirmation. Returns `false` if one is already open.
    pub fn request_submit(&mut self, trigger: SubmitTrigger) -> Result<bool, AppError> {
        self.ensure_in_progress()?;
        if self.prompt.is_some() {
            return Ok(false);
        }
        self.open_prompt(trigger);
        Ok(true)
    }

    fn open_prompt(&mut self, trigger: SubmitTrigger) {
        self.countdown.pause();
        self.guard.disarm();
        self.prompt = Some(SubmitPrompt::new(trigger));
    }

    pub fn cancel_submit(&mut self) -> Result<(), AppError> {
        self.ensure_in_progress()?;
        let prompt = self
            .prompt
            .as_ref()
            .ok_or_else(|| AppError::Conflict("No submission is pending".to_string()))?;

        if prompt.in_flight {
            return Err(AppError::Conflict("Submission is in progress".to_string()));
        }
        if prompt.trigger == SubmitTrigger::TimeExpired {
            return Err(AppError::Conflict(
                "Time is up; the test must be submitted".to_string(),
            ));
        }

        self.prompt = None;
        self.countdown.resume();
        self.guard.arm();
        Ok(())
    }

    /// Scores the answers and builds the payload for the confirmed submission.
    /// Marks the prompt in flight so a second confirmation cannot send another payload.
    pub fn begin_submit(&mut self, now: DateTime<Utc>) -> Result<SubmissionPayload, AppError> {
        self.ensure_in_progress()?;
        let user_id = self
            .user_id
            .clone()
            .ok_or_else(|| AppError::AuthError("No user is signed in".to_string()))?;
        let obtained = count_correct(&self.questions, &self.answers);
        let total = self.questions.len() as u32;

        let prompt = self
            .prompt
            .as_mut()
            .ok_or_else(|| AppError::Conflict("No submission is pending".to_string()))?;
        if prompt.in_flight {
            return Err(AppError::Conflict("Submission is in progress".to_string()));
        }
        prompt.in_flight = true;
        prompt.error = None;

        Ok(SubmissionPayload::new(&user_id, now, total, obtained))
    }

    /// Applies the backend's verdict on a payload from `begin_submit`.
    /// Success moves to `Submitted`; failure keeps the prompt open with the error so the user
    /// can retry without re-answering.
    pub fn finish_submit(
        &mut self,
        payload: &SubmissionPayload,
        outcome: Result<(), AppError>,
    ) -> Result<u32, AppError> {
        match outcome {
            Ok(()) => {
                self.score = Some(payload.obtained_marks);
                self.state = SessionState::Submitted;
                self.prompt = None;
                self.leave_prompt = false;
                self.countdown.pause();
                self.guard.deactivate();
                Ok(payload.obtained_marks)
            }
            Err(err) => {
                if let Some(prompt) = self.prompt.as_mut() {
                    prompt.in_flight = false;
                    prompt.error = Some("Failed to submit test".to_string());
                }
                Err(err)
            }
        }
    }

    pub fn handle_signal(&mut self, signal: PageSignal) -> Result<GuardOutcome, AppError> {
        self.ensure_open()?;
        Ok(self.guard.handle(signal))
    }

    /// Dismisses the abandonment warning.
    pub fn return_to_test(&mut self) -> Result<(), AppError> {
        self.ensure_open()?;
        self.guard.acknowledge();
        Ok(())
    }

    /// Leaving a running test needs confirmation; anything else can leave right away.
    pub fn request_leave(&mut self) -> Result<LeaveDecision, AppError> {
        self.ensure_open()?;
        if self.state == SessionState::InProgress {
            self.leave_prompt = true;
            Ok(LeaveDecision::ConfirmRequired)
        } else {
            Ok(LeaveDecision::Left)
        }
    }

    pub fn stay(&mut self) -> Result<(), AppError> {
        self.ensure_open()?;
        self.leave_prompt = false;
        Ok(())
    }

    /// Tears the session down without submitting.
    pub fn close(&mut self) -> Result<(), AppError> {
        if self.prompt.as_ref().is_some_and(|p| p.in_flight) {
            return Err(AppError::Conflict("Submission is in progress".to_string()));
        }
        self.closed = true;
        self.leave_prompt = false;
        self.countdown.pause();
        self.guard.deactivate();
        Ok(())
    }

    pub fn review(&self) -> Result<Vec<QuestionReview>, AppError> {
        self.ensure_open()?;
        if self.state != SessionState::Submitted {
            return Err(AppError::Conflict(
                "Review is available after submission".to_string(),
            ));
        }
        Ok(build_review(&self.questions, &self.answers))
    }

    pub fn view(&self, id: Uuid) -> SessionView {
        let time_left = self.countdown.remaining();
        SessionView {
            id,
            state: self.state,
            time_left,
            time_left_display: format_time(time_left),
            answers: self.answers.clone(),
            answered: self.answers.len(),
            total_questions: self.questions.len(),
            eligibility: self.eligibility.clone(),
            prompt: self.prompt.as_ref().map(|p| PromptView {
                trigger: p.trigger,
                title: p.title(),
                message: p.message(),
                can_cancel: p.can_cancel(),
                in_flight: p.in_flight,
                error: p.error.clone(),
            }),
            warning: self.guard.warning(),
            leave_prompt: self.leave_prompt,
            score: self.score,
            closed: self.closed,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn time_left(&self) -> u32 {
        self.countdown.remaining()
    }

    /// Whether the countdown should currently be driven by a timer.
    pub fn is_ticking(&self) -> bool {
        !self.closed
            && self.state == SessionState::InProgress
            && self.prompt.is_none()
            && self.countdown.is_running()
    }

    pub fn answers(&self) -> &AnswerMap {
        &self.answers
    }

    pub fn prompt(&self) -> Option<&SubmitPrompt> {
        self.prompt.as_ref()
    }

    pub fn warning(&self) -> Option<SignalKind> {
        self.guard.warning()
    }

    pub fn score(&self) -> Option<u32> {
        self.score
    }

    pub fn eligibility(&self) -> &Eligibility {
        &self.eligibility
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
