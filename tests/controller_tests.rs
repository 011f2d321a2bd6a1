// tests/controller_tests.rs

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use mocktest_session::{
    backend::MockTestBackend,
    config::SessionSettings,
    error::AppError,
    models::{
        question::Question,
        test_record::{SubmissionPayload, TestHistoryRecord},
    },
    session::{
        controller::{SessionController, SessionEvent},
        guard::{PageSignal, SignalKind},
        machine::{SessionState, SubmitTrigger},
        registry::SessionRegistry,
    },
};

/// Backend double that keeps everything in memory.
struct MemoryBackend {
    questions: Vec<Question>,
    history: Result<Vec<TestHistoryRecord>, AppError>,
    submit_delay: Duration,
    submissions: Mutex<Vec<SubmissionPayload>>,
    history_calls: AtomicU32,
}

impl MemoryBackend {
    fn new() -> Self {
        let questions = ["A", "B", "C"]
            .iter()
            .enumerate()
            .map(|(i, correct)| Question {
                id: format!("q{}", i + 1),
                question_number: i as u32 + 1,
                prompt: format!("Question {}", i + 1),
                options: vec!["w".into(), "x".into(), "y".into(), "z".into()],
                correct_option: correct.to_string(),
                img: None,
            })
            .collect();

        Self {
            questions,
            history: Ok(Vec::new()),
            submit_delay: Duration::ZERO,
            submissions: Mutex::new(Vec::new()),
            history_calls: AtomicU32::new(0),
        }
    }

    fn submissions(&self) -> Vec<SubmissionPayload> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl MockTestBackend for MemoryBackend {
    async fn fetch_questions(&self) -> Result<Vec<Question>, AppError> {
        Ok(self.questions.clone())
    }

    async fn fetch_history(&self, _user_id: &str) -> Result<Vec<TestHistoryRecord>, AppError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        self.history.clone()
    }

    async fn submit_result(&self, payload: &SubmissionPayload) -> Result<(), AppError> {
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        self.submissions.lock().unwrap().push(payload.clone());
        Ok(())
    }
}

fn settings(duration_secs: u32) -> SessionSettings {
    SessionSettings {
        duration_secs,
        cooldown_days: 7,
        tick_interval: Duration::from_secs(1),
    }
}

async fn load(backend: Arc<MemoryBackend>, duration_secs: u32) -> SessionController {
    SessionController::load(
        backend,
        Some("u1".to_string()),
        settings(duration_secs),
        Utc::now(),
    )
    .await
    .expect("Failed to load session")
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn countdown_follows_elapsed_seconds() {
    let controller = load(Arc::new(MemoryBackend::new()), 3600).await;
    controller.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(10_500)).await;
    assert_eq!(controller.view().await.time_left, 3590);
    assert!(controller.is_ticking().await);
}

#[tokio::test(start_paused = true)]
async fn expiry_opens_time_up_prompt() {
    let backend = Arc::new(MemoryBackend::new());
    let controller = load(backend.clone(), 3).await;
    let mut rx = controller.subscribe();

    controller.start().await.unwrap();
    controller.answer("q1", "A").await.unwrap();
    tokio::time::sleep(Duration::from_millis(3_500)).await;

    let view = controller.view().await;
    assert_eq!(view.time_left, 0);
    assert_eq!(view.time_left_display, "0:00");
    let prompt = view.prompt.expect("time-up prompt should be open");
    assert_eq!(prompt.trigger, SubmitTrigger::TimeExpired);
    assert_eq!(prompt.title, "Time is up!");
    assert!(!prompt.can_cancel);

    assert_eq!(
        drain(&mut rx),
        vec![
            SessionEvent::Started { time_left: 3 },
            SessionEvent::Tick { time_left: 2 },
            SessionEvent::Tick { time_left: 1 },
            SessionEvent::Tick { time_left: 0 },
            SessionEvent::TimeExpired,
        ]
    );

    // Nothing is recorded until the user confirms.
    assert!(backend.submissions().is_empty());
    assert!(matches!(
        controller.cancel_submit().await,
        Err(AppError::Conflict(_))
    ));

    let score = controller.confirm_submit(Utc::now()).await.unwrap();
    assert_eq!(score, 1);
    assert_eq!(backend.submissions().len(), 1);
    assert_eq!(controller.view().await.state, SessionState::Submitted);
}

#[tokio::test(start_paused = true)]
async fn no_ticks_while_prompt_is_open() {
    let controller = load(Arc::new(MemoryBackend::new()), 60).await;
    controller.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    controller.request_submit().await.unwrap();
    assert_eq!(controller.view().await.time_left, 58);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(controller.view().await.time_left, 58);
    assert!(!controller.is_ticking().await);

    // Half of the interrupted second was already spent before the prompt opened.
    controller.cancel_submit().await.unwrap();
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(controller.view().await.time_left, 57);

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(controller.view().await.time_left, 56);
}

#[tokio::test(start_paused = true)]
async fn pending_manual_prompt_absorbs_expiry() {
    let backend = Arc::new(MemoryBackend::new());
    let controller = load(backend.clone(), 2).await;
    controller.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    controller.request_submit().await.unwrap();

    // The budget would have run out by now; the manual prompt stays the only one.
    tokio::time::sleep(Duration::from_secs(5)).await;
    let view = controller.view().await;
    assert_eq!(view.prompt.unwrap().trigger, SubmitTrigger::Manual);
    assert_eq!(view.time_left, 1);

    controller.confirm_submit(Utc::now()).await.unwrap();
    assert_eq!(backend.submissions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_confirmations_send_one_payload() {
    let mut backend = MemoryBackend::new();
    backend.submit_delay = Duration::from_millis(200);
    let backend = Arc::new(backend);
    let controller = load(backend.clone(), 60).await;

    controller.start().await.unwrap();
    controller.request_submit().await.unwrap();

    let now = Utc::now();
    let (first, second) = tokio::join!(
        controller.confirm_submit(now),
        controller.confirm_submit(now)
    );

    assert_eq!(first.is_ok() as u8 + second.is_ok() as u8, 1);
    assert!(matches!(
        first.err().or(second.err()),
        Some(AppError::Conflict(_))
    ));
    assert_eq!(backend.submissions().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn teardown_stops_the_countdown() {
    let controller = load(Arc::new(MemoryBackend::new()), 60).await;
    let mut rx = controller.subscribe();
    controller.start().await.unwrap();

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    controller.teardown().await.unwrap();
    let left = controller.view().await.time_left;

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(controller.view().await.time_left, left);
    assert!(!controller.is_ticking().await);
    assert_eq!(drain(&mut rx).last(), Some(&SessionEvent::Closed));
    assert!(matches!(
        controller.answer("q1", "A").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn warnings_are_broadcast() {
    let controller = load(Arc::new(MemoryBackend::new()), 60).await;
    let mut rx = controller.subscribe();
    controller.start().await.unwrap();
    drain(&mut rx);

    let out = controller.signal(PageSignal::Hidden).await.unwrap();
    assert_eq!(out.warning, Some(SignalKind::Hidden));
    assert!(
        drain(&mut rx).contains(&SessionEvent::Warning {
            kind: SignalKind::Hidden
        })
    );

    let out = controller.signal(PageSignal::Hidden).await.unwrap();
    assert_eq!(out.warning, None);
    controller.teardown().await.unwrap();
}

#[tokio::test]
async fn history_errors_fail_closed() {
    let mut backend = MemoryBackend::new();
    backend.history = Err(AppError::Upstream("profile down".to_string()));
    let controller = load(Arc::new(backend), 60).await;

    let eligibility = controller.eligibility().await;
    assert!(!eligibility.eligible);
    assert!(matches!(controller.start().await, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn anonymous_load_skips_history_lookup() {
    let backend = Arc::new(MemoryBackend::new());
    let controller = SessionController::load(backend.clone(), None, settings(60), Utc::now())
        .await
        .unwrap();

    assert!(!controller.eligibility().await.eligible);
    assert_eq!(backend.history_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cooldown_is_evaluated_at_load_time() {
    let mut backend = MemoryBackend::new();
    backend.history = Ok(vec![TestHistoryRecord {
        user: Some("u1".to_string()),
        mock_test_number: Some(1),
        date_of_test: Utc.with_ymd_and_hms(2026, 10, 8, 22, 0, 0).unwrap(),
        total_marks: 3,
        obtained_marks: 3,
    }]);
    let backend = Arc::new(backend);

    let before = SessionController::load(
        backend.clone(),
        Some("u1".to_string()),
        settings(60),
        Utc.with_ymd_and_hms(2026, 10, 14, 23, 59, 0).unwrap(),
    )
    .await
    .unwrap();
    assert!(!before.eligibility().await.eligible);

    let on = SessionController::load(
        backend,
        Some("u1".to_string()),
        settings(60),
        Utc.with_ymd_and_hms(2026, 10, 15, 0, 0, 0).unwrap(),
    )
    .await
    .unwrap();
    assert!(on.eligibility().await.eligible);
    on.start().await.unwrap();
    on.teardown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn idle_sessions_are_swept() {
    let backend = Arc::new(MemoryBackend::new());
    let registry = SessionRegistry::new();
    let active = registry.insert(load(backend.clone(), 3600).await).await;
    let abandoned = registry.insert(load(backend.clone(), 7200).await).await;
    abandoned.start().await.unwrap();
    assert_eq!(registry.len().await, 2);

    tokio::time::sleep(Duration::from_secs(30 * 60)).await;
    registry.get(active.id()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(31 * 60)).await;

    assert_eq!(registry.sweep(Duration::from_secs(3600)).await, 1);
    assert_eq!(registry.len().await, 1);
    assert!(registry.get(active.id()).await.is_ok());
    assert!(matches!(
        registry.get(abandoned.id()).await,
        Err(AppError::NotFound(_))
    ));
    assert!(abandoned.is_closed().await);
    assert!(!abandoned.is_ticking().await);
}

#[tokio::test(start_paused = true)]
async fn closed_sessions_are_swept_immediately() {
    let registry = SessionRegistry::new();
    let controller = registry
        .insert(load(Arc::new(MemoryBackend::new()), 60).await)
        .await;
    controller.teardown().await.unwrap();

    assert_eq!(registry.sweep(Duration::from_secs(3600)).await, 1);
    assert_eq!(registry.len().await, 0);
}

#[tokio::test(start_paused = true)]
async fn next_event_waits_for_activity() {
    let controller = load(Arc::new(MemoryBackend::new()), 60).await;

    let idle = controller.next_event(Duration::from_secs(5)).await.unwrap();
    assert_eq!(idle, None);

    controller.start().await.unwrap();
    let event = controller.next_event(Duration::from_secs(5)).await.unwrap();
    assert_eq!(event, Some(SessionEvent::Tick { time_left: 59 }));

    controller.teardown().await.unwrap();
    assert!(matches!(
        controller.next_event(Duration::from_secs(5)).await,
        Err(AppError::NotFound(_))
    ));
}
