// src/models/session.rs

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::models::question::PublicQuestion;
use crate::session::{
    eligibility::Eligibility,
    guard::SignalKind,
    machine::{SessionState, SubmitTrigger},
    review::AnswerMap,
};

/// DTO for opening a session. The caller supplies the user identity explicitly.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[validate(length(min = 1, max = 64), custom(function = validate_user_id))]
    pub user_id: Option<String>,
}

/// User ids are forwarded to the backend as a URL path segment.
fn validate_user_id(user_id: &str) -> Result<(), ValidationError> {
    if user_id == "." || user_id == ".." {
        return Err(ValidationError::new("invalid_user_id"));
    }
    let reserved = |c: char| {
        matches!(c, '/' | '?' | '#' | '%' | '\\') || c.is_whitespace() || c.is_control()
    };
    if user_id.chars().any(reserved) {
        return Err(ValidationError::new("invalid_user_id"));
    }
    Ok(())
}

/// DTO for recording an answer.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    #[validate(length(min = 1, max = 64))]
    pub question_id: String,

    /// Option letter, e.g. "B".
    #[validate(length(equal = 1, message = "Option must be a single letter"))]
    pub option: String,
}

/// DTO for the leave action. `confirm: false` only asks whether a confirmation is required.
#[derive(Debug, Default, Deserialize)]
pub struct LeaveRequest {
    #[serde(default)]
    pub confirm: bool,
}

/// What happened on a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveDecision {
    /// A test is running; the client must show the "Leave test?" dialog.
    ConfirmRequired,
    /// The session was torn down; the client may navigate away.
    Left,
}

/// Response body for a created session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub id: Uuid,
    pub eligibility: Eligibility,
    pub next_available_display: Option<String>,
    pub questions: Vec<PublicQuestion>,
}

/// The open submission confirmation dialog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptView {
    pub trigger: SubmitTrigger,
    pub title: &'static str,
    pub message: &'static str,
    pub can_cancel: bool,
    pub in_flight: bool,
    pub error: Option<String>,
}

/// Snapshot of a session for polling clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub id: Uuid,
    pub state: SessionState,
    pub time_left: u32,
    pub time_left_display: String,
    pub answers: AnswerMap,
    pub answered: usize,
    pub total_questions: usize,
    pub eligibility: Eligibility,
    pub prompt: Option<PromptView>,
    pub warning: Option<SignalKind>,
    pub leave_prompt: bool,
    pub score: Option<u32>,
    pub closed: bool,
}
