use serde::Serialize;
use time::OffsetDateTime;

use super::common::SuccessResponse;

/// Result of asking for the welcome bonus. Only `Granted` added credits.
#[derive(Debug, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum WelcomeBonusOutcome {
    Granted {
        credits: i32,
        valid_days: i64,
        #[serde(with = "time::serde::rfc3339")]
        expires_at: OffsetDateTime,
        balance: i64,
    },
    /// The bonus batch already exists, whatever is left of it
    AlreadyGranted,
    AlreadyHasCredits { balance: i64 },
}

pub type WelcomeBonusResponse = SuccessResponse<WelcomeBonusOutcome>;
