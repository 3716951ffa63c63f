use crate::{
    config::CheckinConfig,
    error::{ApiError, Result},
    models::checkin::{CheckinOutcome, CheckinStatus},
    services::credits_service::{CreditsService, GrantCredits},
};
use entity::{daily_checkins, sea_orm_active_enums::GrantScene};
use sea_orm::{
    entity::*, query::*, sea_query::OnConflict, DatabaseConnection, TransactionTrait,
};
use serde_json::json;
use time::{Date, OffsetDateTime};
use tracing::{info, instrument};
use uuid::Uuid;

/// Longest streak we bother to look back for
const STREAK_LOOKBACK_DAYS: u64 = 366;

pub struct CheckinService {
    db: DatabaseConnection,
    credits_service: CreditsService,
    config: CheckinConfig,
}

impl CheckinService {
    pub fn new(db: DatabaseConnection, config: &CheckinConfig) -> Self {
        let credits_service = CreditsService::new(db.clone());
        Self {
            db,
            credits_service,
            config: config.clone(),
        }
    }

    /// Record today's (UTC) check-in and grant the reward.
    ///
    /// The check-in row and the credit batch commit together; a second check-in on the
    /// same day grants nothing.
    #[instrument(skip(self))]
    pub async fn check_in(&self, user_id: Uuid) -> Result<CheckinOutcome> {
        let now = OffsetDateTime::now_utc();
        let today = now.date();
        let reward = self.config.reward_credits;

        let txn = self.db.begin().await?;

        let checkin_id = Uuid::new_v4();
        let checkin = daily_checkins::ActiveModel {
            id: Set(checkin_id),
            user_id: Set(user_id),
            checkin_date: Set(today),
            reward_credits: Set(reward),
            created_at: Set(now),
        };

        let inserted = daily_checkins::Entity::insert(checkin)
            .on_conflict(
                OnConflict::columns([
                    daily_checkins::Column::UserId,
                    daily_checkins::Column::CheckinDate,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(&txn)
            .await?;

        if inserted == 0 {
            txn.rollback().await?;
            return Err(ApiError::Conflict(
                "You have already checked in today. Please come back tomorrow.".to_string(),
            ));
        }

        let mut grant = GrantCredits::new(
            format!("checkin-{}-{}", user_id, today),
            GrantScene::Checkin,
            reward,
        );
        grant.description = Some(format!("Daily check-in reward: {}", today));
        grant.metadata = Some(json!({
            "type": "daily-checkin",
            "checkinDate": today.to_string(),
            "checkinId": checkin_id,
        }));

        self.credits_service
            .grant_in_txn(user_id, grant, &txn)
            .await?;
        let new_total = self
            .credits_service
            .balance_in_txn(user_id, &txn)
            .await?;

        txn.commit().await?;

        info!(
            user_id = %user_id,
            date = %today,
            reward,
            new_total,
            "Daily check-in recorded"
        );

        Ok(CheckinOutcome {
            added_credits: reward,
            new_total,
            checkin_date: today,
        })
    }

    #[instrument(skip(self))]
    pub async fn can_check_in(&self, user_id: Uuid) -> Result<bool> {
        let today = OffsetDateTime::now_utc().date();

        let existing = daily_checkins::Entity::find()
            .filter(daily_checkins::Column::UserId.eq(user_id))
            .filter(daily_checkins::Column::CheckinDate.eq(today))
            .one(&self.db)
            .await?;

        Ok(existing.is_none())
    }

    #[instrument(skip(self))]
    pub async fn status(&self, user_id: Uuid) -> Result<CheckinStatus> {
        let today = OffsetDateTime::now_utc().date();

        let dates: Vec<Date> = daily_checkins::Entity::find()
            .select_only()
            .column(daily_checkins::Column::CheckinDate)
            .filter(daily_checkins::Column::UserId.eq(user_id))
            .order_by_desc(daily_checkins::Column::CheckinDate)
            .limit(STREAK_LOOKBACK_DAYS)
            .into_tuple()
            .all(&self.db)
            .await?;

        let last_checkin_date = dates.first().copied();

        Ok(CheckinStatus {
            can_check_in: last_checkin_date != Some(today),
            last_checkin_date,
            streak: streak(&dates, today),
        })
    }
}

/// Consecutive check-in days ending today, or yesterday when today is still open.
/// `dates_desc` must be sorted newest first without duplicates.
fn streak(dates_desc: &[Date], today: Date) -> u32 {
    let Some(&latest) = dates_desc.first() else {
        return 0;
    };

    let yesterday = today.previous_day();
    if latest != today && Some(latest) != yesterday {
        return 0;
    }

    let mut count = 0;
    let mut expected = Some(latest);
    for date in dates_desc {
        if Some(*date) != expected {
            break;
        }
        count += 1;
        expected = date.previous_day();
    }
    count
}
