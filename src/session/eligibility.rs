// src/session/eligibility.rs

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;

use crate::models::test_record::TestHistoryRecord;

/// Why a user may or may not start a test right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityReason {
    NoHistory,
    CooldownElapsed,
    CoolingDown,
    Unauthenticated,
    HistoryUnavailable,
}

/// Outcome of the weekly cooldown check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Eligibility {
    pub eligible: bool,
    pub next_available: Option<DateTime<Utc>>,
    pub reason: EligibilityReason,
}

impl Eligibility {
    /// Used when there is no user identity to look history up for.
    pub fn unauthenticated() -> Self {
        Self {
            eligible: false,
            next_available: None,
            reason: EligibilityReason::Unauthenticated,
        }
    }

    /// Used when the history could not be fetched. Fails closed.
    pub fn history_unavailable() -> Self {
        Self {
            eligible: false,
            next_available: None,
            reason: EligibilityReason::HistoryUnavailable,
        }
    }
}

/// Decides whether a new attempt may start at `now`.
///
/// The latest `date_of_test` plus `cooldown_days` gives the next available instant.
/// Both that instant and `now` are truncated to their UTC calendar date before comparing,
/// so an attempt on Monday 23:00 unlocks the following Monday at 00:00 UTC.
/// Negative cooldowns count as zero. A cooldown that overflows the calendar never unlocks.
pub fn evaluate(
    history: &[TestHistoryRecord],
    now: DateTime<Utc>,
    cooldown_days: i64,
) -> Eligibility {
    let Some(last) = history.iter().map(|r| r.date_of_test).max() else {
        return Eligibility {
            eligible: true,
            next_available: None,
            reason: EligibilityReason::NoHistory,
        };
    };

    let Some(next_available) = TimeDelta::try_days(cooldown_days.max(0))
        .and_then(|cooldown| last.checked_add_signed(cooldown))
    else {
        return Eligibility {
            eligible: false,
            next_available: None,
            reason: EligibilityReason::CoolingDown,
        };
    };
    let eligible = now.date_naive() >= next_available.date_naive();

    Eligibility {
        eligible,
        next_available: Some(next_available),
        reason: if eligible {
            EligibilityReason::CooldownElapsed
        } else {
            EligibilityReason::CoolingDown
        },
    }
}
