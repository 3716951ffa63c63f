use entity::{
    consumption_line_items, consumption_records, credit_batches,
    sea_orm_active_enums::{GrantScene, LedgerStatus},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{common::SuccessResponse, credit_batch_ext::CreditBatchExt};

/// Request to grant a batch of credits
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GrantCreditsRequest {
    /// Idempotency key; a second grant with the same value is rejected
    #[validate(length(min = 1, max = 255))]
    pub transaction_no: String,

    pub scene: GrantScene,

    #[validate(range(min = 1, max = 1_000_000))]
    pub amount: i32,

    #[serde(default, with = "time::serde::rfc3339::option")]
    pub expires_at: Option<time::OffsetDateTime>,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    pub metadata: Option<serde_json::Value>,
}

/// Request to debit credits outside of the task flow
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConsumeCreditsRequest {
    #[validate(range(min = 1, max = 1_000_000))]
    pub amount: i32,

    #[validate(length(min = 1, max = 64))]
    pub reason: String,

    #[validate(length(max = 500))]
    pub description: Option<String>,

    pub task_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RevokeBatchRequest {
    #[validate(length(min = 1, max = 255))]
    pub reason: String,
}

/// What a debit is for
#[derive(Debug, Clone)]
pub struct ConsumeReason {
    pub reason: String,
    pub description: Option<String>,
    pub task_id: Option<Uuid>,
}

impl ConsumeReason {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            description: None,
            task_id: None,
        }
    }

    pub fn for_task(reason: impl Into<String>, task_id: Uuid) -> Self {
        Self {
            reason: reason.into(),
            description: None,
            task_id: Some(task_id),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// A grant as seen by callers
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreditBatchRecord {
    pub id: Uuid,
    pub transaction_no: String,
    pub scene: GrantScene,
    pub credits: i32,
    pub consumed: i32,
    pub remaining: i32,
    pub status: LedgerStatus,
    #[serde(with = "time::serde::rfc3339::option")]
    pub expires_at: Option<time::OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: time::OffsetDateTime,
}

impl From<&credit_batches::Model> for CreditBatchRecord {
    fn from(batch: &credit_batches::Model) -> Self {
        Self {
            id: batch.id,
            transaction_no: batch.transaction_no.clone(),
            scene: batch.scene,
            credits: batch.credits,
            consumed: batch.consumed(),
            remaining: batch.remaining_credits,
            status: batch.status,
            expires_at: batch.expires_at,
            created_at: batch.created_at,
        }
    }
}

/// One (batch, amount) pair of a debit
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub batch_id: Uuid,
    pub amount: i32,
}

impl From<&consumption_line_items::Model> for LineItem {
    fn from(item: &consumption_line_items::Model) -> Self {
        Self {
            batch_id: item.batch_id,
            amount: item.amount,
        }
    }
}

/// Result of a successful debit
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionReceipt {
    pub consumption_id: Uuid,
    pub transaction_no: String,
    pub amount: i32,
    pub line_items: Vec<LineItem>,
    pub balance_after: i64,
}

/// A consumption record with its line items
#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionDetail {
    pub id: Uuid,
    pub user_id: Uuid,
    pub transaction_no: String,
    pub amount: i32,
    pub reason: String,
    pub description: Option<String>,
    pub task_id: Option<Uuid>,
    pub status: LedgerStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: time::OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub refunded_at: Option<time::OffsetDateTime>,
    pub line_items: Vec<LineItem>,
}

impl ConsumptionDetail {
    pub fn new(
        record: consumption_records::Model,
        items: &[consumption_line_items::Model],
    ) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            transaction_no: record.transaction_no,
            amount: record.amount,
            reason: record.reason,
            description: record.description,
            task_id: record.task_id,
            status: record.status,
            created_at: record.created_at,
            refunded_at: record.refunded_at,
            line_items: items.iter().map(LineItem::from).collect(),
        }
    }
}

/// Outcome of a refund attempt; only `Refunded` changed any balance
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefundOutcome {
    Refunded { amount: i32 },
    AlreadyRefunded,
    Missing,
    /// Nothing was charged (free-trial task)
    NotCharged,
}

impl RefundOutcome {
    pub fn refunded_amount(&self) -> i32 {
        match self {
            RefundOutcome::Refunded { amount } => *amount,
            _ => 0,
        }
    }
}

/// Net view of a user's debits
#[derive(Debug, Serialize, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionSummary {
    pub active_count: u64,
    pub refunded_count: u64,
    /// Still charged
    pub net_consumed: i64,
    pub refunded: i64,
    /// Everything ever debited
    pub gross_consumed: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditsOverview {
    pub balance: i64,
    pub batches: Vec<CreditBatchRecord>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantCreditsData {
    pub batch: CreditBatchRecord,
    pub balance: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundData {
    #[serde(flatten)]
    pub outcome: RefundOutcome,
    pub consumption_id: Uuid,
}

pub type CreditsOverviewResponse = SuccessResponse<CreditsOverview>;
pub type GrantCreditsResponse = SuccessResponse<GrantCreditsData>;
pub type ConsumptionReceiptResponse = SuccessResponse<ConsumptionReceipt>;
pub type ConsumptionDetailResponse = SuccessResponse<ConsumptionDetail>;
pub type ConsumptionSummaryResponse = SuccessResponse<ConsumptionSummary>;
pub type RefundResponse = SuccessResponse<RefundData>;
pub type CreditBatchResponse = SuccessResponse<CreditBatchRecord>;
