// src/backend/http.rs

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::RwLock;
use url::Url;

use crate::{
    backend::MockTestBackend,
    config::Config,
    error::AppError,
    models::{
        question::Question,
        test_record::{SubmissionPayload, TestHistoryRecord, UserProfile},
    },
};

const QUESTIONS_PATH: &str = "/api/mocktest/questions";
const SUBMIT_PATH: &str = "/api/mocktest/submit";
const PROFILE_SEGMENTS: [&str; 3] = ["api", "users", "profile"];
const REFRESH_PATH: &str = "/api/users/refresh-token";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenResponse {
    access_token: String,
}

/// `MockTestBackend` over JSON/HTTP.
///
/// When an access token is configured every call carries `Authorization: Bearer <token>`.
/// A 403 answer triggers one token refresh and a single retry.
#[derive(Debug)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    access_token: RwLock<Option<String>>,
    refresh_token: Option<String>,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        Ok(Self::with_client(
            client,
            &config.api_base_url,
            config.access_token.clone(),
            config.refresh_token.clone(),
        ))
    }

    pub fn with_client(
        client: Client,
        base_url: &str,
        access_token: Option<String>,
        refresh_token: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token: RwLock::new(access_token),
            refresh_token,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `{base}/api/users/profile/{user_id}` with the id encoded as a single path segment.
    fn profile_url(&self, user_id: &str) -> Result<String, AppError> {
        if user_id.is_empty() || user_id == "." || user_id == ".." {
            return Err(AppError::BadRequest(format!("Invalid user id '{}'", user_id)));
        }

        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::InternalServerError(format!("Invalid API base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::InternalServerError("API base URL cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(PROFILE_SEGMENTS)
            .push(user_id);

        Ok(url.into())
    }

    /// Current access token, if any. Changes after a refresh.
    pub async fn access_token(&self) -> Option<String> {
        self.access_token.read().await.clone()
    }

    async fn send<F>(&self, url: &str, build: F) -> Result<Response, AppError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.access_token().await;
        let mut response = authorize(build(&self.client), token.as_deref())
            .send()
            .await?;

        if response.status() == StatusCode::FORBIDDEN && token.is_some() {
            tracing::debug!("{} answered 403, refreshing access token", url);
            let fresh = self.refresh().await?;
            response = authorize(build(&self.client), Some(&fresh)).send().await?;
        }

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!("{} returned {}", url, status)));
        }
        Ok(response)
    }

    async fn refresh(&self) -> Result<String, AppError> {
        let refresh_token = self
            .refresh_token
            .as_deref()
            .ok_or_else(|| AppError::AuthError("No refresh token found".to_string()))?;

        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .json(&json!({ "refreshToken": refresh_token }))
            .send()
            .await?;

        if !response.status().is_success() {
            tracing::warn!("Token refresh rejected with {}", response.status());
            return Err(AppError::AuthError("Failed to refresh token".to_string()));
        }

        let body: RefreshTokenResponse = response.json().await?;
        *self.access_token.write().await = Some(body.access_token.clone());
        tracing::info!("Access token refreshed");

        Ok(body.access_token)
    }
}

fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
    match token {
        Some(token) => request.bearer_auth(token),
        None => request,
    }
}

#[async_trait]
impl MockTestBackend for HttpBackend {
    async fn fetch_questions(&self) -> Result<Vec<Question>, AppError> {
        let url = self.url(QUESTIONS_PATH);
        let questions: Vec<Question> = self.send(&url, |c| c.get(&url)).await?.json().await?;

        tracing::debug!("Fetched {} questions", questions.len());
        Ok(questions)
    }

    async fn fetch_history(&self, user_id: &str) -> Result<Vec<TestHistoryRecord>, AppError> {
        let url = self.profile_url(user_id)?;
        let profile: UserProfile = self.send(&url, |c| c.get(&url)).await?.json().await?;

        Ok(profile.mock_tests)
    }

    async fn submit_result(&self, payload: &SubmissionPayload) -> Result<(), AppError> {
        let url = self.url(SUBMIT_PATH);
        self.send(&url, |c| c.post(&url).json(payload)).await?;

        tracing::info!(
            user = %payload.user,
            obtained = payload.obtained_marks,
            total = payload.total_marks,
            "Mock test result submitted"
        );
        Ok(())
    }
}
