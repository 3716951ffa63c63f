use crate::{
    error::{ApiError, Result},
    models::{
        credit_batch_ext::{draw_order, plan_draw, CreditBatchExt},
        credits::{
            ConsumeReason, ConsumptionDetail, ConsumptionReceipt, ConsumptionSummary,
            GrantCreditsRequest, LineItem, RefundOutcome,
        },
    },
};
use anyhow::anyhow;
use entity::{
    consumption_line_items, consumption_records, credit_batches,
    sea_orm_active_enums::{GrantScene, LedgerStatus},
};
use sea_orm::{
    entity::*,
    query::*,
    sea_query::{Expr, OnConflict},
    ConnectionTrait, DatabaseConnection, DatabaseTransaction, Select, TransactionTrait,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Credit ledger: grants, debits and their reversal.
///
/// Every mutation runs in one database transaction. The `*_in_txn` variants let other
/// services combine a ledger write with their own rows atomically.
pub struct CreditsService {
    db: DatabaseConnection,
}

impl CreditsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Grant a new batch of credits
    #[instrument(skip(self, grant), fields(transaction_no = %grant.transaction_no))]
    pub async fn grant(&self, user_id: Uuid, grant: GrantCredits) -> Result<credit_batches::Model> {
        let txn = self.db.begin().await?;
        let batch = self.grant_in_txn(user_id, grant, &txn).await?;
        txn.commit().await?;
        Ok(batch)
    }

    /// Grant a new batch of credits within an existing transaction
    #[instrument(skip(self, grant, txn), fields(transaction_no = %grant.transaction_no))]
    pub async fn grant_in_txn(
        &self,
        user_id: Uuid,
        grant: GrantCredits,
        txn: &DatabaseTransaction,
    ) -> Result<credit_batches::Model> {
        if grant.amount <= 0 {
            return Err(ApiError::BadRequest(format!(
                "Grant amount must be positive, got {}",
                grant.amount
            )));
        }

        let now = OffsetDateTime::now_utc();
        if grant.expires_at.is_some_and(|at| at <= now) {
            return Err(ApiError::BadRequest(
                "Grant expiration must be in the future".to_string(),
            ));
        }

        let batch_id = Uuid::new_v4();
        let new_batch = credit_batches::ActiveModel {
            id: Set(batch_id),
            user_id: Set(user_id),
            transaction_no: Set(grant.transaction_no.clone()),
            scene: Set(grant.scene),
            credits: Set(grant.amount),
            remaining_credits: Set(grant.amount),
            status: Set(LedgerStatus::Active),
            description: Set(grant.description),
            metadata: Set(grant.metadata),
            expires_at: Set(grant.expires_at),
            revoked_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        // Insert atomically; a transaction_no seen before inserts nothing instead of erroring.
        let inserted = credit_batches::Entity::insert(new_batch)
            .on_conflict(
                OnConflict::column(credit_batches::Column::TransactionNo)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(txn)
            .await?;

        if inserted == 0 {
            let existing = credit_batches::Entity::find()
                .filter(credit_batches::Column::TransactionNo.eq(grant.transaction_no.as_str()))
                .one(txn)
                .await?
                .ok_or_else(|| {
                    ApiError::Internal(anyhow!(
                        "Grant {} conflicted but no existing batch was found",
                        grant.transaction_no
                    ))
                })?;

            return Err(ApiError::Conflict(format!(
                "Transaction {} already granted at {}",
                grant.transaction_no, existing.created_at
            )));
        }

        let batch = credit_batches::Entity::find_by_id(batch_id)
            .one(txn)
            .await?
            .ok_or_else(|| {
                ApiError::Internal(anyhow!("Failed to read batch {} after insert", batch_id))
            })?;

        info!(
            user_id = %user_id,
            batch_id = %batch.id,
            scene = ?batch.scene,
            amount = batch.credits,
            "Granted credits"
        );

        Ok(batch)
    }

    /// Debit `amount` credits, earliest-expiring batches first
    #[instrument(skip(self, reason), fields(reason = %reason.reason))]
    pub async fn consume(
        &self,
        user_id: Uuid,
        amount: i32,
        reason: ConsumeReason,
    ) -> Result<ConsumptionReceipt> {
        let txn = self.db.begin().await?;

        match self.consume_in_txn(user_id, amount, reason, &txn).await {
            Ok(receipt) => {
                txn.commit().await?;
                Ok(receipt)
            }
            Err(e) => {
                txn.rollback().await?;
                Err(e)
            }
        }
    }

    /// Debit credits within an existing transaction.
    ///
    /// Locks the user's active batches, so concurrent debits against the same user
    /// serialize. On `InsufficientBalance` nothing has been written; the caller decides
    /// whether to roll back.
    #[instrument(skip(self, reason, txn), fields(reason = %reason.reason))]
    pub async fn consume_in_txn(
        &self,
        user_id: Uuid,
        amount: i32,
        reason: ConsumeReason,
        txn: &DatabaseTransaction,
    ) -> Result<ConsumptionReceipt> {
        if amount <= 0 {
            return Err(ApiError::BadRequest(format!(
                "Consumption amount must be positive, got {}",
                amount
            )));
        }

        let now = OffsetDateTime::now_utc();

        // 1. Lock every candidate batch before reading balances
        let mut batches: Vec<credit_batches::Model> = lock_candidate_batches(user_id)
            .all(txn)
            .await?
            .into_iter()
            .filter(|batch| batch.is_spendable(now))
            .collect();

        batches.sort_by(draw_order);

        // 2. Decide where the credits come from
        let available = total_remaining(&batches);
        let (plan, shortfall) = plan_draw(&batches, amount);

        if shortfall > 0 {
            info!(
                user_id = %user_id,
                required = amount,
                available,
                "Rejected consumption: insufficient balance"
            );
            return Err(ApiError::InsufficientBalance {
                required: amount,
                available,
            });
        }

        // 3. Write the debit record
        let consumption_id = Uuid::new_v4();
        let transaction_no = Uuid::now_v7().simple().to_string();

        consumption_records::ActiveModel {
            id: Set(consumption_id),
            user_id: Set(user_id),
            transaction_no: Set(transaction_no.clone()),
            amount: Set(amount),
            reason: Set(reason.reason),
            description: Set(reason.description),
            task_id: Set(reason.task_id),
            status: Set(LedgerStatus::Active),
            created_at: Set(now),
            refunded_at: Set(None),
        }
        .insert(txn)
        .await?;

        // 4. Draw from each batch and record where it went
        let mut line_items = Vec::with_capacity(plan.len());
        for (batch_id, take) in &plan {
            let updated = credit_batches::Entity::update_many()
                .col_expr(
                    credit_batches::Column::RemainingCredits,
                    Expr::col(credit_batches::Column::RemainingCredits).sub(*take),
                )
                .col_expr(credit_batches::Column::UpdatedAt, Expr::value(now))
                .filter(credit_batches::Column::Id.eq(*batch_id))
                .filter(credit_batches::Column::RemainingCredits.gte(*take))
                .exec(txn)
                .await?;

            if updated.rows_affected != 1 {
                return Err(ApiError::Internal(anyhow!(
                    "Batch {} changed under lock while consuming {}",
                    batch_id,
                    take
                )));
            }

            line_items.push(consumption_line_items::ActiveModel {
                id: Set(Uuid::new_v4()),
                consumption_id: Set(consumption_id),
                batch_id: Set(*batch_id),
                amount: Set(*take),
            });
        }

        consumption_line_items::Entity::insert_many(line_items)
            .exec_without_returning(txn)
            .await?;

        info!(
            user_id = %user_id,
            consumption_id = %consumption_id,
            amount,
            batches = plan.len(),
            "Consumed credits"
        );

        Ok(ConsumptionReceipt {
            consumption_id,
            transaction_no,
            amount,
            line_items: plan
                .into_iter()
                .map(|(batch_id, amount)| LineItem { batch_id, amount })
                .collect(),
            balance_after: available - i64::from(amount),
        })
    }

    /// Reverse a consumption record, restoring every debited batch
    #[instrument(skip(self))]
    pub async fn refund(&self, consumption_id: Uuid) -> Result<RefundOutcome> {
        let txn = self.db.begin().await?;
        let outcome = self.refund_in_txn(consumption_id, &txn).await?;
        txn.commit().await?;
        Ok(outcome)
    }

    /// Reverse a consumption record within an existing transaction.
    ///
    /// Idempotent: a record already in `deleted` is left alone. A missing record is a
    /// data-integrity warning, not an error.
    #[instrument(skip(self, txn))]
    pub async fn refund_in_txn(
        &self,
        consumption_id: Uuid,
        txn: &DatabaseTransaction,
    ) -> Result<RefundOutcome> {
        let record = consumption_records::Entity::find_by_id(consumption_id)
            .lock_exclusive()
            .one(txn)
            .await?;

        let Some(record) = record else {
            warn!(
                consumption_id = %consumption_id,
                "Refund requested for a consumption record that does not exist"
            );
            return Ok(RefundOutcome::Missing);
        };

        if record.status == LedgerStatus::Deleted {
            info!(consumption_id = %consumption_id, "Consumption already refunded");
            return Ok(RefundOutcome::AlreadyRefunded);
        }

        let now = OffsetDateTime::now_utc();

        // Claim the active -> deleted transition; a concurrent refund sees zero rows here
        let claimed = consumption_records::Entity::update_many()
            .col_expr(
                consumption_records::Column::Status,
                Expr::value(LedgerStatus::Deleted),
            )
            .col_expr(consumption_records::Column::RefundedAt, Expr::value(now))
            .filter(consumption_records::Column::Id.eq(consumption_id))
            .filter(consumption_records::Column::Status.eq(LedgerStatus::Active))
            .exec(txn)
            .await?;

        if claimed.rows_affected == 0 {
            return Ok(RefundOutcome::AlreadyRefunded);
        }

        let items = line_items_in_lock_order(consumption_id).all(txn).await?;

        let mut restored = 0;
        for item in &items {
            credit_batches::Entity::update_many()
                .col_expr(
                    credit_batches::Column::RemainingCredits,
                    Expr::col(credit_batches::Column::RemainingCredits).add(item.amount),
                )
                .col_expr(credit_batches::Column::UpdatedAt, Expr::value(now))
                .filter(credit_batches::Column::Id.eq(item.batch_id))
                .exec(txn)
                .await?;
            restored += item.amount;
        }

        if restored != record.amount {
            warn!(
                consumption_id = %consumption_id,
                recorded = record.amount,
                restored,
                "Line items do not add up to the recorded amount"
            );
        }

        info!(
            user_id = %record.user_id,
            consumption_id = %consumption_id,
            amount = restored,
            "Refunded consumption"
        );

        Ok(RefundOutcome::Refunded { amount: restored })
    }

    /// Spendable credits: active, unexpired batches
    #[instrument(skip(self))]
    pub async fn balance(&self, user_id: Uuid) -> Result<i64> {
        spendable_balance(&self.db, user_id).await
    }

    pub async fn balance_in_txn(&self, user_id: Uuid, txn: &DatabaseTransaction) -> Result<i64> {
        spendable_balance(txn, user_id).await
    }

    /// Active batches, oldest grant first
    #[instrument(skip(self))]
    pub async fn list_batches(&self, user_id: Uuid) -> Result<Vec<credit_batches::Model>> {
        let batches = credit_batches::Entity::find()
            .filter(credit_batches::Column::UserId.eq(user_id))
            .filter(credit_batches::Column::Status.eq(LedgerStatus::Active))
            .order_by_asc(credit_batches::Column::CreatedAt)
            .all(&self.db)
            .await?;

        Ok(batches)
    }

    /// Take a batch out of circulation (e.g. chargeback). Revoking twice is a no-op.
    #[instrument(skip(self))]
    pub async fn revoke_batch(
        &self,
        batch_id: Uuid,
        reason: &str,
    ) -> Result<credit_batches::Model> {
        let txn = self.db.begin().await?;

        let batch = credit_batches::Entity::find_by_id(batch_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Credit batch {} not found", batch_id)))?;

        if batch.status == LedgerStatus::Deleted {
            txn.commit().await?;
            return Ok(batch);
        }

        let mut batch_active: credit_batches::ActiveModel = batch.into();
        batch_active.status = Set(LedgerStatus::Deleted);
        batch_active.revoked_reason = Set(Some(reason.to_string()));
        batch_active.updated_at = Set(OffsetDateTime::now_utc());
        let batch = batch_active.update(&txn).await?;

        txn.commit().await?;

        info!(
            user_id = %batch.user_id,
            batch_id = %batch.id,
            forfeited = batch.remaining_credits,
            reason,
            "Revoked credit batch"
        );

        Ok(batch)
    }

    /// A consumption record with its line items
    #[instrument(skip(self))]
    pub async fn get_consumption(&self, consumption_id: Uuid) -> Result<ConsumptionDetail> {
        let record = consumption_records::Entity::find_by_id(consumption_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| {
                ApiError::NotFound(format!("Consumption record {} not found", consumption_id))
            })?;

        let items = consumption_line_items::Entity::find()
            .filter(consumption_line_items::Column::ConsumptionId.eq(consumption_id))
            .all(&self.db)
            .await?;

        Ok(ConsumptionDetail::new(record, &items))
    }

    /// Totals of charged vs refunded debits for a user
    #[instrument(skip(self))]
    pub async fn consumption_summary(&self, user_id: Uuid) -> Result<ConsumptionSummary> {
        let records: Vec<(LedgerStatus, i32)> = consumption_records::Entity::find()
            .select_only()
            .column(consumption_records::Column::Status)
            .column(consumption_records::Column::Amount)
            .filter(consumption_records::Column::UserId.eq(user_id))
            .into_tuple()
            .all(&self.db)
            .await?;

        Ok(summarize(&records))
    }
}

/// Active batches with credits left, locked in primary-key order.
///
/// A fixed lock order keeps concurrent debits of one user from deadlocking each other.
fn lock_candidate_batches(user_id: Uuid) -> Select<credit_batches::Entity> {
    credit_batches::Entity::find()
        .filter(credit_batches::Column::UserId.eq(user_id))
        .filter(credit_batches::Column::Status.eq(LedgerStatus::Active))
        .filter(credit_batches::Column::RemainingCredits.gt(0))
        .order_by_asc(credit_batches::Column::Id)
        .lock_exclusive()
}

/// Line items of a debit ordered by batch, so a refund touches batch rows in the same
/// order as a debit locks them
fn line_items_in_lock_order(consumption_id: Uuid) -> Select<consumption_line_items::Entity> {
    consumption_line_items::Entity::find()
        .filter(consumption_line_items::Column::ConsumptionId.eq(consumption_id))
        .order_by_asc(consumption_line_items::Column::BatchId)
}

/// Sum in i64: each batch fits in i32, a user's total need not
fn total_remaining<'a>(batches: impl IntoIterator<Item = &'a credit_batches::Model>) -> i64 {
    batches
        .into_iter()
        .map(|batch| i64::from(batch.remaining_credits))
        .sum()
}

async fn spendable_balance<C: ConnectionTrait>(conn: &C, user_id: Uuid) -> Result<i64> {
    let now = OffsetDateTime::now_utc();

    let batches = credit_batches::Entity::find()
        .filter(credit_batches::Column::UserId.eq(user_id))
        .filter(credit_batches::Column::Status.eq(LedgerStatus::Active))
        .filter(credit_batches::Column::RemainingCredits.gt(0))
        .all(conn)
        .await?;

    Ok(total_remaining(
        batches.iter().filter(|batch| batch.is_spendable(now)),
    ))
}

fn summarize(records: &[(LedgerStatus, i32)]) -> ConsumptionSummary {
    records
        .iter()
        .fold(ConsumptionSummary::default(), |mut summary, (status, amount)| {
            let amount = i64::from(*amount);
            match status {
                LedgerStatus::Active => {
                    summary.active_count += 1;
                    summary.net_consumed += amount;
                }
                LedgerStatus::Deleted => {
                    summary.refunded_count += 1;
                    summary.refunded += amount;
                }
            }
            summary.gross_consumed += amount;
            summary
        })
}

/// Input for a new credit batch
#[derive(Debug, Clone)]
pub struct GrantCredits {
    /// Idempotency key, unique across all grants
    pub transaction_no: String,
    pub scene: GrantScene,
    pub amount: i32,
    pub expires_at: Option<OffsetDateTime>,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl GrantCredits {
    pub fn new(transaction_no: impl Into<String>, scene: GrantScene, amount: i32) -> Self {
        Self {
            transaction_no: transaction_no.into(),
            scene,
            amount,
            expires_at: None,
            description: None,
            metadata: None,
        }
    }

    pub fn expiring_at(mut self, expires_at: OffsetDateTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

impl From<GrantCreditsRequest> for GrantCredits {
    fn from(request: GrantCreditsRequest) -> Self {
        Self {
            transaction_no: request.transaction_no,
            scene: request.scene,
            amount: request.amount,
            expires_at: request.expires_at,
            description: request.description,
            metadata: request.metadata,
        }
    }
}
