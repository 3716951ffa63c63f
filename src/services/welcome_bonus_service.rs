use crate::{
    config::WelcomeConfig,
    error::{ApiError, Result},
    models::welcome::WelcomeBonusOutcome,
    services::credits_service::{CreditsService, GrantCredits},
};
use entity::{credit_batches, sea_orm_active_enums::GrantScene};
use sea_orm::{entity::*, query::*, DatabaseConnection, TransactionTrait};
use serde_json::json;
use time::{Duration, OffsetDateTime};
use tracing::{info, instrument};
use uuid::Uuid;

pub struct WelcomeBonusService {
    db: DatabaseConnection,
    credits_service: CreditsService,
    config: WelcomeConfig,
}

impl WelcomeBonusService {
    pub fn new(db: DatabaseConnection, config: &WelcomeConfig) -> Self {
        let credits_service = CreditsService::new(db.clone());
        Self {
            db,
            credits_service,
            config: config.clone(),
        }
    }

    /// The bonus batch is keyed by user, so a user gets it at most once
    pub fn transaction_no(user_id: Uuid) -> String {
        format!("welcome-{}", user_id)
    }

    /// Grant the free-plan credits to a user who holds none.
    ///
    /// A user with a spendable balance is left alone. The batch expires after
    /// `valid_days`, and a concurrent request loses on the unique transaction number.
    #[instrument(skip(self))]
    pub async fn grant_welcome(&self, user_id: Uuid) -> Result<WelcomeBonusOutcome> {
        let transaction_no = Self::transaction_no(user_id);
        let txn = self.db.begin().await?;

        let existing = credit_batches::Entity::find()
            .filter(credit_batches::Column::TransactionNo.eq(transaction_no.as_str()))
            .one(&txn)
            .await?;
        if existing.is_some() {
            txn.rollback().await?;
            info!(user_id = %user_id, "Welcome bonus denied: already granted");
            return Ok(WelcomeBonusOutcome::AlreadyGranted);
        }

        let balance = self.credits_service.balance_in_txn(user_id, &txn).await?;
        if balance > 0 {
            txn.rollback().await?;
            info!(user_id = %user_id, balance, "Welcome bonus denied: user already has credits");
            return Ok(WelcomeBonusOutcome::AlreadyHasCredits { balance });
        }

        let expires_at = OffsetDateTime::now_utc() + Duration::days(self.config.valid_days);
        let mut grant = GrantCredits::new(transaction_no, GrantScene::Grant, self.config.credits)
            .expiring_at(expires_at);
        grant.description = Some("Welcome bonus: Free plan credits".to_string());
        grant.metadata = Some(json!({
            "type": "welcome-bonus",
            "validDays": self.config.valid_days,
        }));

        match self.credits_service.grant_in_txn(user_id, grant, &txn).await {
            Ok(_) => {}
            Err(ApiError::Conflict(_)) => {
                txn.rollback().await?;
                return Ok(WelcomeBonusOutcome::AlreadyGranted);
            }
            Err(e) => {
                txn.rollback().await?;
                return Err(e);
            }
        }
        let balance = self.credits_service.balance_in_txn(user_id, &txn).await?;

        txn.commit().await?;

        info!(
            user_id = %user_id,
            credits = self.config.credits,
            expires_at = %expires_at,
            "Welcome bonus granted"
        );

        Ok(WelcomeBonusOutcome::Granted {
            credits: self.config.credits,
            valid_days: self.config.valid_days,
            expires_at,
            balance,
        })
    }
}
