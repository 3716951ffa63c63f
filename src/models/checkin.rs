use serde::Serialize;

use super::common::SuccessResponse;

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CheckinOutcome {
    pub added_credits: i32,
    pub new_total: i64,
    pub checkin_date: time::Date,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CheckinStatus {
    pub can_check_in: bool,
    pub last_checkin_date: Option<time::Date>,
    /// Consecutive days up to today (or yesterday if not yet checked in today)
    pub streak: u32,
}

pub type CheckinResponse = SuccessResponse<CheckinOutcome>;
pub type CheckinStatusResponse = SuccessResponse<CheckinStatus>;
