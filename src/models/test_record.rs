// src/models/test_record.rs

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One prior mock test attempt, as listed in the user's profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestHistoryRecord {
    /// Owning user id. The profile endpoint omits it since the list is already per user.
    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub mock_test_number: Option<u32>,

    pub date_of_test: DateTime<Utc>,

    pub total_marks: u32,
    pub obtained_marks: u32,
}

/// Subset of the profile document this service cares about.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub mock_tests: Vec<TestHistoryRecord>,
}

/// Body posted to the backend once a test is confirmed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub user: String,

    /// ISO-8601 timestamp with millisecond precision, e.g. `2026-10-15T08:30:00.000Z`.
    pub date_of_test: String,

    pub total_marks: u32,
    pub obtained_marks: u32,
}

impl SubmissionPayload {
    pub fn new(user: &str, submitted_at: DateTime<Utc>, total_marks: u32, obtained_marks: u32) -> Self {
        Self {
            user: user.to_owned(),
            date_of_test: submitted_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            total_marks,
            obtained_marks,
        }
    }
}
