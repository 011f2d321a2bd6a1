// src/backend/mod.rs

//! Access to the external REST backend that owns questions, profiles and results.

pub mod http;

use async_trait::async_trait;

use crate::{
    error::AppError,
    models::{
        question::Question,
        test_record::{SubmissionPayload, TestHistoryRecord},
    },
};

pub use http::HttpBackend;

#[async_trait]
pub trait MockTestBackend: Send + Sync {
    /// The full question set for a test, in display order.
    async fn fetch_questions(&self) -> Result<Vec<Question>, AppError>;

    /// Prior attempts of `user_id`.
    async fn fetch_history(&self, user_id: &str) -> Result<Vec<TestHistoryRecord>, AppError>;

    /// Records a result. `Ok` only for a 2xx answer; the body is ignored.
    async fn submit_result(&self, payload: &SubmissionPayload) -> Result<(), AppError>;
}
