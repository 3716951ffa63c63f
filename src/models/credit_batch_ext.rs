/// Extension methods for credit_batches entity
///
/// Business rules layered over the generated entity in entity/src/credit_batches.rs
use entity::{credit_batches, sea_orm_active_enums::LedgerStatus};
use std::cmp::Ordering;
use time::OffsetDateTime;

/// Extension trait for CreditBatch model
pub trait CreditBatchExt {
    /// Credits already drawn from this batch
    fn consumed(&self) -> i32;

    fn is_expired(&self, now: OffsetDateTime) -> bool;

    /// Active, unexpired and not empty
    fn is_spendable(&self, now: OffsetDateTime) -> bool;
}

impl CreditBatchExt for credit_batches::Model {
    fn consumed(&self) -> i32 {
        self.credits - self.remaining_credits
    }

    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn is_spendable(&self, now: OffsetDateTime) -> bool {
        self.status == LedgerStatus::Active && self.remaining_credits > 0 && !self.is_expired(now)
    }
}

/// Draw order: earliest expiry first, never-expiring last, then oldest grant.
pub fn draw_order(a: &credit_batches::Model, b: &credit_batches::Model) -> Ordering {
    match (a.expires_at, b.expires_at) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then(a.created_at.cmp(&b.created_at))
    .then(a.id.cmp(&b.id))
}

/// Split `amount` across batches already sorted by [`draw_order`].
///
/// Returns `(batch_id, drawn)` pairs and whatever could not be covered.
pub fn plan_draw(batches: &[credit_batches::Model], amount: i32) -> (Vec<(uuid::Uuid, i32)>, i32) {
    let mut remaining = amount;
    let mut plan = Vec::new();

    for batch in batches {
        if remaining == 0 {
            break;
        }
        if batch.remaining_credits <= 0 {
            continue;
        }
        let take = remaining.min(batch.remaining_credits);
        plan.push((batch.id, take));
        remaining -= take;
    }

    (plan, remaining)
}
