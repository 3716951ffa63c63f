use serde::Serialize;
use uuid::Uuid;

use super::common::SuccessResponse;

/// How a task's charge lines up with its outcome
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChargeState {
    /// Failed and the charge was reversed
    Refunded,
    /// Failed but the charge is still active
    PendingRefund,
    /// Link points at a record that does not exist
    MissingRecord,
    /// Paid task without a consumption link
    Unlinked,
    FreeTrial,
    /// Not failed, yet the charge was reversed
    UnexpectedRefund,
}

/// Which of a task's debits a finding is about
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChargeKind {
    Submission,
    Translation,
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TaskChargeAudit {
    pub task_id: Uuid,
    pub charge: ChargeKind,
    pub consumption_id: Option<Uuid>,
    pub state: ChargeState,
}

#[derive(Debug, Serialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub user_id: Uuid,
    pub failed_tasks: usize,
    pub refunded: usize,
    pub pending_refund: usize,
    pub missing_record: usize,
    pub unlinked: usize,
    pub free_trial: usize,
    pub unexpected_refund: usize,
    /// Only the rows that need attention
    pub findings: Vec<TaskChargeAudit>,
}

impl AuditReport {
    pub fn is_consistent(&self) -> bool {
        self.pending_refund == 0
            && self.missing_record == 0
            && self.unlinked == 0
            && self.unexpected_refund == 0
    }
}

#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub user_id: Uuid,
    pub refunded: usize,
    pub already_refunded: usize,
    pub relinked: usize,
    pub unmatched: usize,
    pub missing: usize,
    /// Tasks skipped because of a database error (logged)
    pub errors: usize,
    pub credits_restored: i64,
}

pub type AuditResponse = SuccessResponse<AuditReport>;
pub type RepairResponse = SuccessResponse<RepairReport>;
