// src/handlers/session.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    config::EVENT_POLL_TIMEOUT,
    error::AppError,
    models::session::{
        AnswerRequest, CreateSessionRequest, LeaveDecision, LeaveRequest, SessionCreated,
    },
    session::{controller::SessionController, guard::PageSignal, registry::SessionRegistry},
    state::AppState,
    utils::format::format_date,
};

/// Opens a new mock test session for the given user.
///
/// Loads the question set and the user's test history in parallel.
/// Returns 201 with the questions (without answers) and the eligibility decision.
/// Returns 502 if the question set cannot be loaded.
pub async fn create_session(
    State(state): State<AppState>,
    Json(payload): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let controller = SessionController::load(
        state.backend.clone(),
        payload.user_id,
        state.config.session_settings(),
        Utc::now(),
    )
    .await?;

    let controller = state.sessions.insert(controller).await;
    let eligibility = controller.eligibility().await;

    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            id: controller.id(),
            next_available_display: eligibility.next_available.map(format_date),
            eligibility,
            questions: controller.public_questions().await,
        }),
    ))
}

pub async fn get_session(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let controller = sessions.get(id).await?;
    Ok(Json(controller.view().await))
}

/// Tears the session down without submitting.
pub async fn delete_session(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    sessions.remove(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Long-polls for the next session event (tick, warning, expiry, submission).
/// Returns 204 if nothing happened within the poll timeout.
pub async fn next_event(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let controller = sessions.get(id).await?;
    let response = match controller.next_event(EVENT_POLL_TIMEOUT).await? {
        Some(event) => Json(event).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    };
    Ok(response)
}

pub async fn start_session(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let controller = sessions.get(id).await?;
    Ok(Json(controller.start().await?))
}

pub async fn record_answer(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let controller = sessions.get(id).await?;
    Ok(Json(
        controller
            .answer(&payload.question_id, &payload.option)
            .await?,
    ))
}

/// Opens the submission confirmation.
pub async fn request_submit(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let controller = sessions.get(id).await?;
    Ok(Json(controller.request_submit().await?))
}

/// Confirms the submission and posts the result to the backend.
/// On backend failure the confirmation stays open and the call may be retried.
pub async fn confirm_submit(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let controller = sessions.get(id).await?;
    controller.confirm_submit(Utc::now()).await?;
    Ok(Json(controller.view().await))
}

pub async fn cancel_submit(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let controller = sessions.get(id).await?;
    Ok(Json(controller.cancel_submit().await?))
}

/// Reports a page event (visibility change, pointer leave, unload).
pub async fn send_signal(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
    Json(signal): Json<PageSignal>,
) -> Result<impl IntoResponse, AppError> {
    let controller = sessions.get(id).await?;
    Ok(Json(controller.signal(signal).await?))
}

/// "Return to test" on the abandonment warning.
pub async fn return_to_test(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let controller = sessions.get(id).await?;
    Ok(Json(controller.return_to_test().await?))
}

/// Leave click (`confirm: false`) or "Leave anyway" (`confirm: true`).
pub async fn leave(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
    Json(payload): Json<LeaveRequest>,
) -> Result<impl IntoResponse, AppError> {
    let controller = sessions.get(id).await?;

    let decision = if payload.confirm {
        controller.teardown().await?;
        LeaveDecision::Left
    } else {
        controller.request_leave().await?
    };

    if decision == LeaveDecision::Left {
        sessions.forget(id).await;
    }

    Ok(Json(json!({ "decision": decision })))
}

pub async fn stay(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let controller = sessions.get(id).await?;
    Ok(Json(controller.stay().await?))
}

/// Per-question feedback, available once the test is submitted.
pub async fn get_review(
    State(sessions): State<SessionRegistry>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let controller = sessions.get(id).await?;
    let view = controller.view().await;
    let review = controller.review().await?;

    Ok(Json(json!({
        "score": view.score,
        "totalMarks": view.total_questions,
        "questions": review,
    })))
}
