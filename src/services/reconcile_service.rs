//! Checks that every failed task had its charge reversed, and repairs the ones that did not.
//!
//! New tasks cannot drift: `TaskService` links and refunds atomically. This exists for rows
//! written before that guarantee and for operator verification.

use crate::{
    error::Result,
    models::{
        credits::RefundOutcome,
        reconcile::{AuditReport, ChargeKind, ChargeState, RepairReport, TaskChargeAudit},
    },
    services::{credits_service::CreditsService, task_service::MEDIA_TASK_REASON},
};
use entity::{
    consumption_records, media_tasks,
    sea_orm_active_enums::{LedgerStatus, TaskStatus},
};
use sea_orm::{entity::*, query::*, DatabaseConnection, TransactionTrait};
use std::collections::HashMap;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

pub struct ReconcileService {
    db: DatabaseConnection,
    credits_service: CreditsService,
}

impl ReconcileService {
    pub fn new(db: DatabaseConnection) -> Self {
        let credits_service = CreditsService::new(db.clone());
        Self {
            db,
            credits_service,
        }
    }

    /// Classify every charged or failed task of a user. Read-only.
    #[instrument(skip(self))]
    pub async fn audit(&self, user_id: Uuid) -> Result<AuditReport> {
        let tasks = media_tasks::Entity::find()
            .filter(media_tasks::Column::UserId.eq(user_id))
            .order_by_asc(media_tasks::Column::CreatedAt)
            .all(&self.db)
            .await?;

        let consumption_ids: Vec<Uuid> = tasks
            .iter()
            .flat_map(|t| [t.consumption_id, t.translation_consumption_id])
            .flatten()
            .collect();
        let records: HashMap<Uuid, consumption_records::Model> = if consumption_ids.is_empty() {
            HashMap::new()
        } else {
            consumption_records::Entity::find()
                .filter(consumption_records::Column::Id.is_in(consumption_ids))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|r| (r.id, r))
                .collect()
        };

        let mut report = AuditReport {
            user_id,
            ..Default::default()
        };

        for task in &tasks {
            if task.status == TaskStatus::Failed {
                report.failed_tasks += 1;
            }

            let mut charges = vec![(ChargeKind::Submission, task.consumption_id)];
            if let Some(id) = task.translation_consumption_id {
                charges.push((ChargeKind::Translation, Some(id)));
            }

            for (charge, consumption_id) in charges {
                let record = consumption_id.and_then(|id| records.get(&id));
                let Some(state) = classify(task, consumption_id, record) else {
                    continue;
                };

                match state {
                    ChargeState::Refunded => report.refunded += 1,
                    ChargeState::PendingRefund => report.pending_refund += 1,
                    ChargeState::MissingRecord => report.missing_record += 1,
                    ChargeState::Unlinked => report.unlinked += 1,
                    ChargeState::FreeTrial => report.free_trial += 1,
                    ChargeState::UnexpectedRefund => report.unexpected_refund += 1,
                }

                if !matches!(state, ChargeState::Refunded | ChargeState::FreeTrial) {
                    report.findings.push(TaskChargeAudit {
                        task_id: task.id,
                        charge,
                        consumption_id,
                        state,
                    });
                }
            }
        }

        info!(
            user_id = %user_id,
            failed = report.failed_tasks,
            pending_refund = report.pending_refund,
            unlinked = report.unlinked,
            consistent = report.is_consistent(),
            "Audited task charges"
        );

        Ok(report)
    }

    /// Refund failed tasks whose charge is still active.
    ///
    /// Unlinked tasks are matched best-effort to an active debit carrying their task id.
    /// Per-task errors are logged and counted; the sweep keeps going.
    #[instrument(skip(self))]
    pub async fn repair(&self, user_id: Uuid) -> Result<RepairReport> {
        let failed = media_tasks::Entity::find()
            .filter(media_tasks::Column::UserId.eq(user_id))
            .filter(media_tasks::Column::Status.eq(TaskStatus::Failed))
            .order_by_asc(media_tasks::Column::CreatedAt)
            .all(&self.db)
            .await?;

        let mut report = RepairReport {
            user_id,
            ..Default::default()
        };

        for task in &failed {
            let linked = task.consumption_id.is_some();
            let result = match task.consumption_id {
                Some(consumption_id) => Some(self.credits_service.refund(consumption_id).await),
                None if task.is_free_trial => None,
                None => Some(self.relink_and_refund(task).await),
            };
            if let Some(result) = result {
                tally(&mut report, task.id, linked, result);
            }

            if let Some(consumption_id) = task.translation_consumption_id {
                let result = self.credits_service.refund(consumption_id).await;
                tally(&mut report, task.id, true, result);
            }
        }

        info!(
            user_id = %user_id,
            refunded = report.refunded,
            relinked = report.relinked,
            unmatched = report.unmatched,
            credits_restored = report.credits_restored,
            "Repaired task charges"
        );

        Ok(report)
    }

    /// Find the debit that paid for an unlinked task, link it and refund it in one transaction.
    /// Returns `Missing` when nothing matches.
    async fn relink_and_refund(&self, task: &media_tasks::Model) -> Result<RefundOutcome> {
        let txn = self.db.begin().await?;

        let matching = consumption_records::Entity::find()
            .filter(consumption_records::Column::UserId.eq(task.user_id))
            .filter(consumption_records::Column::TaskId.eq(task.id))
            .filter(consumption_records::Column::Reason.eq(MEDIA_TASK_REASON))
            .filter(consumption_records::Column::Status.eq(LedgerStatus::Active))
            .order_by_asc(consumption_records::Column::CreatedAt)
            .lock_exclusive()
            .one(&txn)
            .await?;

        let Some(record) = matching else {
            warn!(task_id = %task.id, "No matching consumption record for unlinked task");
            txn.rollback().await?;
            return Ok(RefundOutcome::Missing);
        };

        media_tasks::Entity::update_many()
            .col_expr(
                media_tasks::Column::ConsumptionId,
                sea_orm::sea_query::Expr::value(Some(record.id)),
            )
            .filter(media_tasks::Column::Id.eq(task.id))
            .exec(&txn)
            .await?;

        let outcome = self.credits_service.refund_in_txn(record.id, &txn).await?;
        txn.commit().await?;

        info!(
            task_id = %task.id,
            consumption_id = %record.id,
            "Linked orphaned consumption record to task"
        );

        Ok(outcome)
    }
}

/// Count one refund attempt. `linked` is false when the debit had to be matched first.
fn tally(
    report: &mut RepairReport,
    task_id: Uuid,
    linked: bool,
    result: Result<RefundOutcome>,
) {
    match result {
        Ok(RefundOutcome::Refunded { amount }) => {
            report.refunded += 1;
            report.credits_restored += i64::from(amount);
            if !linked {
                report.relinked += 1;
            }
        }
        Ok(RefundOutcome::AlreadyRefunded) => report.already_refunded += 1,
        Ok(RefundOutcome::Missing) if !linked => report.unmatched += 1,
        Ok(RefundOutcome::Missing) => report.missing += 1,
        Ok(RefundOutcome::NotCharged) => {}
        Err(e) => {
            error!(task_id = %task_id, "Failed to repair task charge: {}", e);
            report.errors += 1;
        }
    }
}

/// State of one of a task's debits. `None` when there is nothing to report
/// (running, or finished and still charged).
fn classify(
    task: &media_tasks::Model,
    consumption_id: Option<Uuid>,
    record: Option<&consumption_records::Model>,
) -> Option<ChargeState> {
    let failed = task.status == TaskStatus::Failed;

    match (consumption_id, record) {
        (None, _) if !failed => None,
        (None, _) if task.is_free_trial => Some(ChargeState::FreeTrial),
        (None, _) => Some(ChargeState::Unlinked),
        (Some(_), None) if failed => Some(ChargeState::MissingRecord),
        (Some(_), None) => None,
        (Some(_), Some(record)) => match (failed, record.status) {
            (true, LedgerStatus::Deleted) => Some(ChargeState::Refunded),
            (true, LedgerStatus::Active) => Some(ChargeState::PendingRefund),
            (false, LedgerStatus::Deleted) => Some(ChargeState::UnexpectedRefund),
            (false, LedgerStatus::Active) => None,
        },
    }
}
