use crate::{fund, setup_test_db};
use creditline::{
    error::ApiError,
    models::credits::{ConsumeReason, RefundOutcome},
    services::{CreditsService, GrantCredits},
};
use entity::{
    consumption_line_items, credit_batches,
    sea_orm_active_enums::{GrantScene, LedgerStatus},
};
use sea_orm::{entity::*, query::*};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

fn reason() -> ConsumeReason {
    ConsumeReason::new("api")
}

#[tokio::test]
async fn test_consume_then_refund_restores_balance() {
    let db = setup_test_db().await;
    let service = CreditsService::new(db);
    let user_id = Uuid::new_v4();

    fund(&service, user_id, 30).await;

    let receipt = service.consume(user_id, 12, reason()).await.unwrap();
    assert_eq!(receipt.balance_after, 18);
    assert_eq!(service.balance(user_id).await.unwrap(), 18);

    let outcome = service.refund(receipt.consumption_id).await.unwrap();
    assert_eq!(outcome, RefundOutcome::Refunded { amount: 12 });
    assert_eq!(service.balance(user_id).await.unwrap(), 30);

    let detail = service.get_consumption(receipt.consumption_id).await.unwrap();
    assert_eq!(detail.status, LedgerStatus::Deleted);
    assert!(detail.refunded_at.is_some());
}

#[tokio::test]
async fn test_second_refund_changes_nothing() {
    let db = setup_test_db().await;
    let service = CreditsService::new(db);
    let user_id = Uuid::new_v4();

    fund(&service, user_id, 20).await;
    let receipt = service.consume(user_id, 20, reason()).await.unwrap();

    assert_eq!(
        service.refund(receipt.consumption_id).await.unwrap(),
        RefundOutcome::Refunded { amount: 20 }
    );
    assert_eq!(
        service.refund(receipt.consumption_id).await.unwrap(),
        RefundOutcome::AlreadyRefunded
    );
    assert_eq!(service.balance(user_id).await.unwrap(), 20);
}

#[tokio::test]
async fn test_refund_of_unknown_record_is_missing() {
    let db = setup_test_db().await;
    let service = CreditsService::new(db);

    let outcome = service.refund(Uuid::new_v4()).await.unwrap();
    assert_eq!(outcome, RefundOutcome::Missing);
}

#[tokio::test]
async fn test_insufficient_balance_leaves_ledger_untouched() {
    let db = setup_test_db().await;
    let service = CreditsService::new(db);
    let user_id = Uuid::new_v4();

    fund(&service, user_id, 5).await;
    fund(&service, user_id, 4).await;

    let err = service.consume(user_id, 10, reason()).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::InsufficientBalance {
            required: 10,
            available: 9
        }
    ));

    assert_eq!(service.balance(user_id).await.unwrap(), 9);
    let summary = service.consumption_summary(user_id).await.unwrap();
    assert_eq!(summary.active_count, 0);
}

#[tokio::test]
async fn test_line_items_span_batches_and_sum_to_amount() {
    let db = setup_test_db().await;
    let service = CreditsService::new(db.clone());
    let user_id = Uuid::new_v4();

    let first = fund(&service, user_id, 6).await;
    let second = fund(&service, user_id, 10).await;

    let receipt = service.consume(user_id, 9, reason()).await.unwrap();
    assert_eq!(receipt.line_items.len(), 2);
    assert_eq!(receipt.line_items.iter().map(|i| i.amount).sum::<i32>(), 9);

    let stored = consumption_line_items::Entity::find()
        .filter(consumption_line_items::Column::ConsumptionId.eq(receipt.consumption_id))
        .all(&db)
        .await
        .unwrap();
    assert_eq!(stored.iter().map(|i| i.amount).sum::<i32>(), 9);

    let first = credit_batches::Entity::find_by_id(first).one(&db).await.unwrap().unwrap();
    let second = credit_batches::Entity::find_by_id(second).one(&db).await.unwrap().unwrap();
    assert_eq!(first.remaining_credits + second.remaining_credits, 7);
}

#[tokio::test]
async fn test_earliest_expiring_batch_is_drawn_first() {
    let db = setup_test_db().await;
    let service = CreditsService::new(db);
    let user_id = Uuid::new_v4();
    let now = OffsetDateTime::now_utc();

    let permanent = fund(&service, user_id, 10).await;
    let late = service
        .grant(
            user_id,
            GrantCredits::new("late", GrantScene::Subscription, 10)
                .expiring_at(now + Duration::days(30)),
        )
        .await
        .unwrap();
    let soon = service
        .grant(
            user_id,
            GrantCredits::new("soon", GrantScene::Award, 10).expiring_at(now + Duration::days(1)),
        )
        .await
        .unwrap();

    let receipt = service.consume(user_id, 15, reason()).await.unwrap();
    let drawn: Vec<(Uuid, i32)> = receipt
        .line_items
        .iter()
        .map(|i| (i.batch_id, i.amount))
        .collect();
    assert_eq!(drawn, vec![(soon.id, 10), (late.id, 5)]);
    assert!(!drawn.iter().any(|(id, _)| *id == permanent));
}

#[tokio::test]
async fn test_expired_batch_is_not_spendable() {
    let db = setup_test_db().await;
    let service = CreditsService::new(db.clone());
    let user_id = Uuid::new_v4();
    let now = OffsetDateTime::now_utc();

    credit_batches::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        transaction_no: Set("expired".to_string()),
        scene: Set(GrantScene::Purchase),
        credits: Set(50),
        remaining_credits: Set(50),
        status: Set(LedgerStatus::Active),
        description: Set(None),
        metadata: Set(None),
        expires_at: Set(Some(now - Duration::hours(1))),
        revoked_reason: Set(None),
        created_at: Set(now - Duration::days(31)),
        updated_at: Set(now - Duration::days(31)),
    }
    .insert(&db)
    .await
    .unwrap();
    fund(&service, user_id, 3).await;

    assert_eq!(service.balance(user_id).await.unwrap(), 3);
    let err = service.consume(user_id, 5, reason()).await.unwrap_err();
    assert!(matches!(err, ApiError::InsufficientBalance { available: 3, .. }));
}

#[tokio::test]
async fn test_duplicate_transaction_no_is_conflict() {
    let db = setup_test_db().await;
    let service = CreditsService::new(db);
    let user_id = Uuid::new_v4();

    service
        .grant(user_id, GrantCredits::new("order-42", GrantScene::Purchase, 100))
        .await
        .unwrap();
    let err = service
        .grant(user_id, GrantCredits::new("order-42", GrantScene::Purchase, 100))
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(service.balance(user_id).await.unwrap(), 100);
}

#[tokio::test]
async fn test_grant_rejects_past_expiry_and_non_positive_amount() {
    let db = setup_test_db().await;
    let service = CreditsService::new(db);
    let user_id = Uuid::new_v4();

    let past = GrantCredits::new("past", GrantScene::Grant, 5)
        .expiring_at(OffsetDateTime::now_utc() - Duration::minutes(1));
    assert!(matches!(
        service.grant(user_id, past).await,
        Err(ApiError::BadRequest(_))
    ));
    assert!(matches!(
        service
            .grant(user_id, GrantCredits::new("zero", GrantScene::Grant, 0))
            .await,
        Err(ApiError::BadRequest(_))
    ));
}

#[tokio::test]
async fn test_revoked_batch_leaves_balance() {
    let db = setup_test_db().await;
    let service = CreditsService::new(db);
    let user_id = Uuid::new_v4();

    let revoked = fund(&service, user_id, 40).await;
    fund(&service, user_id, 2).await;

    let batch = service.revoke_batch(revoked, "chargeback").await.unwrap();
    assert_eq!(batch.status, LedgerStatus::Deleted);
    assert_eq!(batch.revoked_reason.as_deref(), Some("chargeback"));
    assert_eq!(service.balance(user_id).await.unwrap(), 2);

    // Revoking again is a no-op
    let again = service.revoke_batch(revoked, "other").await.unwrap();
    assert_eq!(again.revoked_reason.as_deref(), Some("chargeback"));

    let batches = service.list_batches(user_id).await.unwrap();
    assert_eq!(batches.len(), 1);
    assert_ne!(batches[0].id, revoked);
}

#[tokio::test]
async fn test_consumption_summary_nets_out_refunds() {
    let db = setup_test_db().await;
    let service = CreditsService::new(db);
    let user_id = Uuid::new_v4();

    fund(&service, user_id, 100).await;
    let a = service.consume(user_id, 10, reason()).await.unwrap();
    service.consume(user_id, 15, reason()).await.unwrap();
    service.refund(a.consumption_id).await.unwrap();

    let summary = service.consumption_summary(user_id).await.unwrap();
    assert_eq!(summary.active_count, 1);
    assert_eq!(summary.refunded_count, 1);
    assert_eq!(summary.net_consumed, 15);
    assert_eq!(summary.refunded, 10);
    assert_eq!(summary.gross_consumed, 25);
}

#[tokio::test]
async fn test_balance_beyond_i32_range() {
    let db = setup_test_db().await;
    let service = CreditsService::new(db);
    let user_id = Uuid::new_v4();

    fund(&service, user_id, 1_500_000_000).await;
    fund(&service, user_id, 1_500_000_000).await;

    assert_eq!(service.balance(user_id).await.unwrap(), 3_000_000_000);

    let receipt = service.consume(user_id, 10, reason()).await.unwrap();
    assert_eq!(receipt.balance_after, 2_999_999_990);
    assert_eq!(service.balance(user_id).await.unwrap(), 2_999_999_990);
}

#[tokio::test]
async fn test_refund_to_revoked_batch_restores_remaining_but_not_balance() {
    let db = setup_test_db().await;
    let service = CreditsService::new(db.clone());
    let user_id = Uuid::new_v4();

    let batch_id = fund(&service, user_id, 20).await;
    let receipt = service.consume(user_id, 8, reason()).await.unwrap();
    service.revoke_batch(batch_id, "chargeback").await.unwrap();
    assert_eq!(service.balance(user_id).await.unwrap(), 0);

    let outcome = service.refund(receipt.consumption_id).await.unwrap();
    assert_eq!(outcome, RefundOutcome::Refunded { amount: 8 });

    let batch = credit_batches::Entity::find_by_id(batch_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.remaining_credits, 20);
    assert_eq!(batch.status, LedgerStatus::Deleted);
    assert_eq!(service.balance(user_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_refund_to_expired_batch_restores_remaining_but_not_balance() {
    let db = setup_test_db().await;
    let service = CreditsService::new(db.clone());
    let user_id = Uuid::new_v4();

    let batch = service
        .grant(
            user_id,
            GrantCredits::new("short-lived", GrantScene::Award, 20)
                .expiring_at(OffsetDateTime::now_utc() + Duration::days(1)),
        )
        .await
        .unwrap();
    let receipt = service.consume(user_id, 8, reason()).await.unwrap();

    // Let the batch lapse after the debit
    credit_batches::Entity::update_many()
        .col_expr(
            credit_batches::Column::ExpiresAt,
            sea_orm::sea_query::Expr::value(Some(OffsetDateTime::now_utc() - Duration::hours(1))),
        )
        .filter(credit_batches::Column::Id.eq(batch.id))
        .exec(&db)
        .await
        .unwrap();

    let outcome = service.refund(receipt.consumption_id).await.unwrap();
    assert_eq!(outcome, RefundOutcome::Refunded { amount: 8 });

    let batch = credit_batches::Entity::find_by_id(batch.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(batch.remaining_credits, 20);
    assert_eq!(service.balance(user_id).await.unwrap(), 0);
}
