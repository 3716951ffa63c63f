use crate::{
    config::{PricingConfig, TaskConfig},
    error::{ApiError, Result},
    models::{
        credits::{ConsumeReason, RefundOutcome},
        tasks::{
            detect_platform, task_cost, SubmitTaskRequest, TaskFailure, TaskProgressRequest,
            TaskStatusExt,
        },
    },
    services::credits_service::CreditsService,
};
use entity::{
    media_tasks,
    sea_orm_active_enums::{OutputType, TaskStatus},
};
use sea_orm::{
    entity::*, query::*, DatabaseConnection, DatabaseTransaction, PaginatorTrait,
    TransactionTrait,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Reason recorded on every task debit
pub const MEDIA_TASK_REASON: &str = "media-task";

/// Reason recorded on the surcharge for translating an extracted subtitle
pub const TRANSLATION_REASON: &str = "media-task-translation";

const ACTIVE_STATUSES: [TaskStatus; 3] = [
    TaskStatus::Pending,
    TaskStatus::Extracting,
    TaskStatus::Translating,
];

/// Media tasks and the credits they consume
pub struct TaskService {
    db: DatabaseConnection,
    credits_service: CreditsService,
    pricing: PricingConfig,
    config: TaskConfig,
}

impl TaskService {
    pub fn new(db: DatabaseConnection, pricing: &PricingConfig, config: &TaskConfig) -> Self {
        let credits_service = CreditsService::new(db.clone());
        Self {
            db,
            credits_service,
            pricing: pricing.clone(),
            config: config.clone(),
        }
    }

    /// Create a task and charge for it.
    ///
    /// The debit and the task row commit together, and a paid task always carries its
    /// consumption id.
    #[instrument(skip(self, request), fields(url = %request.url))]
    pub async fn submit(
        &self,
        user_id: Uuid,
        request: SubmitTaskRequest,
    ) -> Result<media_tasks::Model> {
        let platform = detect_platform(&request.url).ok_or_else(|| {
            ApiError::BadRequest(
                "Invalid URL. Only YouTube and TikTok are supported.".to_string(),
            )
        })?;

        // Translation only applies to subtitle output
        let target_lang = match request.output_type {
            OutputType::Video => None,
            OutputType::Subtitle => request.target_lang,
        };
        let cost = task_cost(
            &self.pricing,
            platform,
            request.output_type,
            target_lang.as_deref(),
        );

        let task_id = Uuid::new_v4();
        let txn = self.db.begin().await?;

        // 1. Charge. A free trial only covers a user the locked batches cannot pay for
        let reason = ConsumeReason::for_task(MEDIA_TASK_REASON, task_id).with_description(
            format!("{:?} {:?} task", platform, request.output_type).to_lowercase(),
        );
        let consumption_id = match self
            .credits_service
            .consume_in_txn(user_id, cost, reason, &txn)
            .await
        {
            Ok(receipt) => Some(receipt.consumption_id),
            Err(ApiError::InsufficientBalance {
                required,
                available,
            }) => {
                if !self.free_trial_available(user_id, &txn).await? {
                    txn.rollback().await?;
                    return Err(ApiError::InsufficientBalance {
                        required,
                        available,
                    });
                }
                None
            }
            Err(e) => {
                txn.rollback().await?;
                return Err(e);
            }
        };
        let is_free_trial = consumption_id.is_none();

        // 2. Concurrent task limit
        let active = media_tasks::Entity::find()
            .filter(media_tasks::Column::UserId.eq(user_id))
            .filter(media_tasks::Column::Status.is_in(ACTIVE_STATUSES))
            .count(&txn)
            .await?;

        if active >= self.config.concurrent_limit {
            txn.rollback().await?;
            return Err(ApiError::Conflict(
                "You already have an active task. Please wait for it to complete.".to_string(),
            ));
        }

        // 3. Task row, linked to its debit
        let now = OffsetDateTime::now_utc();
        let task = media_tasks::ActiveModel {
            id: Set(task_id),
            user_id: Set(user_id),
            platform: Set(platform),
            video_url: Set(request.url),
            output_type: Set(request.output_type),
            target_lang: Set(target_lang),
            status: Set(TaskStatus::Pending),
            progress: Set(0),
            cost_credits: Set(if is_free_trial { 0 } else { cost }),
            is_free_trial: Set(is_free_trial),
            consumption_id: Set(consumption_id),
            translation_consumption_id: Set(None),
            title: Set(None),
            source_lang: Set(None),
            srt_url: Set(None),
            translated_srt_url: Set(None),
            result_video_url: Set(None),
            error_message: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;

        info!(
            user_id = %user_id,
            task_id = %task.id,
            cost = task.cost_credits,
            free_trial = is_free_trial,
            "Submitted media task"
        );

        Ok(task)
    }

    /// Apply a progress report from the media worker
    #[instrument(skip(self, update))]
    pub async fn update_progress(
        &self,
        task_id: Uuid,
        update: TaskProgressRequest,
    ) -> Result<media_tasks::Model> {
        let txn = self.db.begin().await?;
        let task = self.lock_task(task_id, &txn).await?;

        if task.status.is_terminal() {
            return Err(ApiError::Conflict(format!(
                "Task {} already finished with status {:?}",
                task_id, task.status
            )));
        }

        let next_status = update.status.unwrap_or(task.status);
        if next_status == TaskStatus::Failed {
            return Err(ApiError::BadRequest(
                "Report failures through the fail endpoint so credits are refunded".to_string(),
            ));
        }
        if !task.status.can_transition_to(next_status) {
            return Err(ApiError::Conflict(format!(
                "Cannot move task {} from {:?} to {:?}",
                task_id, task.status, next_status
            )));
        }

        let progress = match update.progress {
            Some(p) if p < task.progress => {
                return Err(ApiError::BadRequest(format!(
                    "Progress cannot go backwards ({} -> {})",
                    task.progress, p
                )));
            }
            Some(p) => p,
            None if next_status.is_terminal() => 100,
            None => task.progress,
        };

        let mut task_active: media_tasks::ActiveModel = task.into();
        task_active.status = Set(next_status);
        task_active.progress = Set(progress);
        if let Some(title) = update.title {
            task_active.title = Set(Some(title));
        }
        if let Some(source_lang) = update.source_lang {
            task_active.source_lang = Set(Some(source_lang));
        }
        if let Some(srt_url) = update.srt_url {
            task_active.srt_url = Set(Some(srt_url));
        }
        if let Some(url) = update.translated_srt_url {
            task_active.translated_srt_url = Set(Some(url));
        }
        if let Some(url) = update.result_video_url {
            task_active.result_video_url = Set(Some(url));
        }
        task_active.updated_at = Set(OffsetDateTime::now_utc());
        let task = task_active.update(&txn).await?;

        txn.commit().await?;

        info!(
            task_id = %task.id,
            status = ?task.status,
            progress = task.progress,
            "Updated media task"
        );

        Ok(task)
    }

    /// Send an extracted subtitle for translation, charging the surcharge.
    ///
    /// Free trial tasks translate without a charge. The debit is linked on the task so a
    /// later failure refunds it along with the submission charge.
    #[instrument(skip(self))]
    pub async fn translate(&self, task_id: Uuid, target_lang: String) -> Result<media_tasks::Model> {
        let txn = self.db.begin().await?;
        let task = self.lock_task(task_id, &txn).await?;

        if task.output_type != OutputType::Subtitle {
            return Err(ApiError::BadRequest(format!(
                "Task {} is a video download and has no subtitle to translate",
                task_id
            )));
        }
        if task.status != TaskStatus::Extracted {
            return Err(ApiError::Conflict(format!(
                "Task is not ready for translation. Current status: {:?}",
                task.status
            )));
        }
        if task.srt_url.is_none() {
            return Err(ApiError::BadRequest(format!(
                "Task {} has no extracted subtitle to translate",
                task_id
            )));
        }

        let surcharge = self.pricing.translation_surcharge;
        let translation_consumption_id = if task.is_free_trial {
            None
        } else {
            let reason = ConsumeReason::for_task(TRANSLATION_REASON, task_id)
                .with_description(format!("subtitle translation: {}", target_lang));
            match self
                .credits_service
                .consume_in_txn(task.user_id, surcharge, reason, &txn)
                .await
            {
                Ok(receipt) => Some(receipt.consumption_id),
                Err(e) => {
                    txn.rollback().await?;
                    return Err(e);
                }
            }
        };

        let cost_credits = match translation_consumption_id {
            Some(_) => task.cost_credits + surcharge,
            None => task.cost_credits,
        };

        let mut task_active: media_tasks::ActiveModel = task.into();
        task_active.status = Set(TaskStatus::Translating);
        task_active.progress = Set(0);
        task_active.target_lang = Set(Some(target_lang));
        task_active.cost_credits = Set(cost_credits);
        task_active.translation_consumption_id = Set(translation_consumption_id);
        task_active.updated_at = Set(OffsetDateTime::now_utc());
        let task = task_active.update(&txn).await?;

        txn.commit().await?;

        info!(
            task_id = %task.id,
            user_id = %task.user_id,
            charged = translation_consumption_id.is_some(),
            "Media task sent for translation"
        );

        Ok(task)
    }

    /// Mark a task failed and refund its credits in the same transaction.
    ///
    /// Both the submission debit and any translation debit are reversed. Failing an
    /// already-failed task repeats nothing: the refunds report `AlreadyRefunded`.
    #[instrument(skip(self))]
    pub async fn fail(&self, task_id: Uuid, error_message: Option<String>) -> Result<TaskFailure> {
        let txn = self.db.begin().await?;
        let task = self.lock_task(task_id, &txn).await?;

        if task.status.is_terminal() && task.status != TaskStatus::Failed {
            return Err(ApiError::Conflict(format!(
                "Task {} already finished with status {:?}",
                task_id, task.status
            )));
        }

        let consumption_id = task.consumption_id;
        let translation_consumption_id = task.translation_consumption_id;
        let task = if task.status == TaskStatus::Failed {
            task
        } else {
            let mut task_active: media_tasks::ActiveModel = task.into();
            task_active.status = Set(TaskStatus::Failed);
            task_active.error_message =
                Set(Some(error_message.unwrap_or_else(|| "Unknown error".to_string())));
            task_active.updated_at = Set(OffsetDateTime::now_utc());
            task_active.update(&txn).await?
        };

        let outcome = match consumption_id {
            Some(consumption_id) => {
                self.credits_service
                    .refund_in_txn(consumption_id, &txn)
                    .await?
            }
            None if task.is_free_trial => RefundOutcome::NotCharged,
            None => {
                warn!(
                    task_id = %task.id,
                    "Failed paid task has no consumption link; reconciliation required"
                );
                RefundOutcome::Missing
            }
        };

        let translation_refund = match translation_consumption_id {
            Some(consumption_id) => Some(
                self.credits_service
                    .refund_in_txn(consumption_id, &txn)
                    .await?,
            ),
            None => None,
        };

        txn.commit().await?;

        info!(
            task_id = %task.id,
            user_id = %task.user_id,
            refund = ?outcome,
            translation_refund = ?translation_refund,
            "Media task failed"
        );

        Ok(TaskFailure {
            task,
            refund: outcome,
            translation_refund,
        })
    }

    #[instrument(skip(self))]
    pub async fn find(&self, task_id: Uuid) -> Result<media_tasks::Model> {
        media_tasks::Entity::find_by_id(task_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Task {} not found", task_id)))
    }

    /// Most recent tasks first
    #[instrument(skip(self))]
    pub async fn history(&self, user_id: Uuid) -> Result<Vec<media_tasks::Model>> {
        let tasks = media_tasks::Entity::find()
            .filter(media_tasks::Column::UserId.eq(user_id))
            .order_by_desc(media_tasks::Column::CreatedAt)
            .limit(self.config.history_limit)
            .all(&self.db)
            .await?;

        Ok(tasks)
    }

    #[instrument(skip(self))]
    pub async fn active_tasks(&self, user_id: Uuid) -> Result<Vec<media_tasks::Model>> {
        let tasks = media_tasks::Entity::find()
            .filter(media_tasks::Column::UserId.eq(user_id))
            .filter(media_tasks::Column::Status.is_in(ACTIVE_STATUSES))
            .all(&self.db)
            .await?;

        Ok(tasks)
    }

    async fn lock_task(
        &self,
        task_id: Uuid,
        txn: &DatabaseTransaction,
    ) -> Result<media_tasks::Model> {
        media_tasks::Entity::find_by_id(task_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Task {} not found", task_id)))
    }

    async fn free_trial_available(&self, user_id: Uuid, txn: &DatabaseTransaction) -> Result<bool> {
        if self.config.free_trial_count == 0 {
            return Ok(false);
        }

        let used = media_tasks::Entity::find()
            .filter(media_tasks::Column::UserId.eq(user_id))
            .filter(media_tasks::Column::IsFreeTrial.eq(true))
            .count(txn)
            .await?;

        Ok(used < self.config.free_trial_count)
    }
}
