use crate::{fund, setup_test_db};
use creditline::{
    config::{PricingConfig, TaskConfig},
    error::ApiError,
    models::{
        credits::RefundOutcome,
        tasks::{SubmitTaskRequest, TaskProgressRequest},
    },
    services::{CreditsService, TaskService},
};
use entity::{
    media_tasks,
    sea_orm_active_enums::{LedgerStatus, OutputType, TaskPlatform, TaskStatus},
};
use sea_orm::{entity::*, query::*, DatabaseConnection, PaginatorTrait};
use uuid::Uuid;

fn services(db: &DatabaseConnection, config: TaskConfig) -> (TaskService, CreditsService) {
    (
        TaskService::new(db.clone(), &PricingConfig::default(), &config),
        CreditsService::new(db.clone()),
    )
}

fn youtube_subtitles() -> SubmitTaskRequest {
    SubmitTaskRequest {
        url: "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
        output_type: OutputType::Subtitle,
        target_lang: None,
    }
}

#[tokio::test]
async fn test_submit_charges_and_links_consumption() {
    let db = setup_test_db().await;
    let (tasks, credits) = services(&db, TaskConfig::default());
    let user_id = Uuid::new_v4();
    fund(&credits, user_id, 25).await;

    let task = tasks.submit(user_id, youtube_subtitles()).await.unwrap();

    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.platform, TaskPlatform::Youtube);
    assert_eq!(task.cost_credits, 10);
    assert!(!task.is_free_trial);
    assert_eq!(credits.balance(user_id).await.unwrap(), 15);

    let consumption_id = task.consumption_id.expect("paid task must be linked");
    let record = credits.get_consumption(consumption_id).await.unwrap();
    assert_eq!(record.amount, 10);
    assert_eq!(record.task_id, Some(task.id));
    assert_eq!(record.status, LedgerStatus::Active);
}

#[tokio::test]
async fn test_pricing_by_platform_and_output() {
    let db = setup_test_db().await;
    let config = TaskConfig {
        concurrent_limit: 10,
        ..Default::default()
    };
    let (tasks, credits) = services(&db, config);
    let user_id = Uuid::new_v4();
    fund(&credits, user_id, 100).await;

    let video = tasks
        .submit(
            user_id,
            SubmitTaskRequest {
                url: "https://www.tiktok.com/@someone/video/123".to_string(),
                output_type: OutputType::Video,
                target_lang: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(video.platform, TaskPlatform::Tiktok);
    assert_eq!(video.cost_credits, 15);

    let translated = tasks
        .submit(
            user_id,
            SubmitTaskRequest {
                target_lang: Some("zh".to_string()),
                ..youtube_subtitles()
            },
        )
        .await
        .unwrap();
    assert_eq!(translated.cost_credits, 15);
    assert_eq!(translated.target_lang.as_deref(), Some("zh"));

    assert_eq!(credits.balance(user_id).await.unwrap(), 70);
}

#[tokio::test]
async fn test_unsupported_url_is_rejected_without_charge() {
    let db = setup_test_db().await;
    let (tasks, credits) = services(&db, TaskConfig::default());
    let user_id = Uuid::new_v4();
    fund(&credits, user_id, 20).await;

    let err = tasks
        .submit(
            user_id,
            SubmitTaskRequest {
                url: "https://vimeo.com/12345".to_string(),
                ..youtube_subtitles()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::BadRequest(_)));
    assert_eq!(credits.balance(user_id).await.unwrap(), 20);
}

#[tokio::test]
async fn test_submit_without_credits_creates_nothing() {
    let db = setup_test_db().await;
    let (tasks, credits) = services(&db, TaskConfig::default());
    let user_id = Uuid::new_v4();
    fund(&credits, user_id, 4).await;

    let err = tasks.submit(user_id, youtube_subtitles()).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::InsufficientBalance {
            required: 10,
            available: 4
        }
    ));

    let count = media_tasks::Entity::find()
        .filter(media_tasks::Column::UserId.eq(user_id))
        .count(&db)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_concurrent_limit_rolls_back_charge() {
    let db = setup_test_db().await;
    let (tasks, credits) = services(&db, TaskConfig::default());
    let user_id = Uuid::new_v4();
    fund(&credits, user_id, 50).await;

    tasks.submit(user_id, youtube_subtitles()).await.unwrap();
    let err = tasks.submit(user_id, youtube_subtitles()).await.unwrap_err();

    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(credits.balance(user_id).await.unwrap(), 40);
    assert_eq!(tasks.active_tasks(user_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_fail_refunds_once() {
    let db = setup_test_db().await;
    let (tasks, credits) = services(&db, TaskConfig::default());
    let user_id = Uuid::new_v4();
    fund(&credits, user_id, 10).await;

    let task = tasks.submit(user_id, youtube_subtitles()).await.unwrap();
    assert_eq!(credits.balance(user_id).await.unwrap(), 0);

    let failure = tasks
        .fail(task.id, Some("yt-dlp exited with 1".to_string()))
        .await
        .unwrap();
    assert_eq!(failure.task.status, TaskStatus::Failed);
    assert_eq!(
        failure.task.error_message.as_deref(),
        Some("yt-dlp exited with 1")
    );
    assert_eq!(failure.refund, RefundOutcome::Refunded { amount: 10 });
    assert_eq!(failure.translation_refund, None);
    assert_eq!(credits.balance(user_id).await.unwrap(), 10);

    let again = tasks.fail(task.id, None).await.unwrap();
    assert_eq!(again.refund, RefundOutcome::AlreadyRefunded);
    assert_eq!(credits.balance(user_id).await.unwrap(), 10);

    // A failed task frees its slot
    assert!(tasks.active_tasks(user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_free_trial_when_out_of_credits() {
    let db = setup_test_db().await;
    let config = TaskConfig {
        free_trial_count: 1,
        concurrent_limit: 5,
        ..Default::default()
    };
    let (tasks, credits) = services(&db, config);
    let user_id = Uuid::new_v4();

    let trial = tasks.submit(user_id, youtube_subtitles()).await.unwrap();
    assert!(trial.is_free_trial);
    assert_eq!(trial.cost_credits, 0);
    assert_eq!(trial.consumption_id, None);

    // Trial used up
    let err = tasks.submit(user_id, youtube_subtitles()).await.unwrap_err();
    assert!(matches!(err, ApiError::InsufficientBalance { .. }));

    let failure = tasks.fail(trial.id, None).await.unwrap();
    assert_eq!(failure.refund, RefundOutcome::NotCharged);
    assert_eq!(credits.balance(user_id).await.unwrap(), 0);
}

#[tokio::test]
async fn test_progress_follows_status_machine() {
    let db = setup_test_db().await;
    let (tasks, credits) = services(&db, TaskConfig::default());
    let user_id = Uuid::new_v4();
    fund(&credits, user_id, 10).await;
    let task = tasks.submit(user_id, youtube_subtitles()).await.unwrap();

    let extracting = tasks
        .update_progress(
            task.id,
            TaskProgressRequest {
                status: Some(TaskStatus::Extracting),
                progress: Some(40),
                title: Some("Never Gonna Give You Up".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(extracting.status, TaskStatus::Extracting);
    assert_eq!(extracting.progress, 40);

    let backwards = tasks
        .update_progress(
            task.id,
            TaskProgressRequest {
                progress: Some(10),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(backwards, Err(ApiError::BadRequest(_))));

    let failed_via_progress = tasks
        .update_progress(
            task.id,
            TaskProgressRequest {
                status: Some(TaskStatus::Failed),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(failed_via_progress, Err(ApiError::BadRequest(_))));

    let done = tasks
        .update_progress(
            task.id,
            TaskProgressRequest {
                status: Some(TaskStatus::Completed),
                srt_url: Some("https://cdn.example.com/a.srt".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.progress, 100);
    assert_eq!(done.title.as_deref(), Some("Never Gonna Give You Up"));

    // Finished tasks keep their charge
    let err = tasks.fail(task.id, None).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(credits.balance(user_id).await.unwrap(), 0);

    let history = tasks.history(user_id).await.unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_illegal_transition_is_conflict() {
    let db = setup_test_db().await;
    let (tasks, credits) = services(&db, TaskConfig::default());
    let user_id = Uuid::new_v4();
    fund(&credits, user_id, 10).await;
    let task = tasks.submit(user_id, youtube_subtitles()).await.unwrap();

    let err = tasks
        .update_progress(
            task.id,
            TaskProgressRequest {
                status: Some(TaskStatus::Translating),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));

    let missing = tasks.find(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(missing, ApiError::NotFound(_)));
}

#[tokio::test]
async fn test_free_trial_when_balance_is_short_of_cost() {
    let db = setup_test_db().await;
    let config = TaskConfig {
        free_trial_count: 1,
        ..Default::default()
    };
    let (tasks, credits) = services(&db, config);
    let user_id = Uuid::new_v4();
    fund(&credits, user_id, 4).await;

    let trial = tasks.submit(user_id, youtube_subtitles()).await.unwrap();
    assert!(trial.is_free_trial);
    assert_eq!(trial.consumption_id, None);
    // The partial balance is left untouched
    assert_eq!(credits.balance(user_id).await.unwrap(), 4);
}

#[tokio::test]
async fn test_funded_user_is_charged_even_with_trial_left() {
    let db = setup_test_db().await;
    let config = TaskConfig {
        free_trial_count: 1,
        ..Default::default()
    };
    let (tasks, credits) = services(&db, config);
    let user_id = Uuid::new_v4();
    fund(&credits, user_id, 10).await;

    let task = tasks.submit(user_id, youtube_subtitles()).await.unwrap();
    assert!(!task.is_free_trial);
    assert!(task.consumption_id.is_some());
    assert_eq!(credits.balance(user_id).await.unwrap(), 0);
}

/// Drive a task to `Extracted` with a subtitle, as the media worker would
async fn extract(tasks: &TaskService, task_id: Uuid) {
    tasks
        .update_progress(
            task_id,
            TaskProgressRequest {
                status: Some(TaskStatus::Extracting),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    tasks
        .update_progress(
            task_id,
            TaskProgressRequest {
                status: Some(TaskStatus::Extracted),
                srt_url: Some("https://cdn.example.com/raw.srt".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_translate_charges_surcharge() {
    let db = setup_test_db().await;
    let (tasks, credits) = services(&db, TaskConfig::default());
    let user_id = Uuid::new_v4();
    fund(&credits, user_id, 20).await;

    let task = tasks.submit(user_id, youtube_subtitles()).await.unwrap();
    extract(&tasks, task.id).await;

    let translating = tasks.translate(task.id, "zh".to_string()).await.unwrap();
    assert_eq!(translating.status, TaskStatus::Translating);
    assert_eq!(translating.progress, 0);
    assert_eq!(translating.target_lang.as_deref(), Some("zh"));
    assert_eq!(translating.cost_credits, 15);
    assert_eq!(credits.balance(user_id).await.unwrap(), 5);

    let record = credits
        .get_consumption(translating.translation_consumption_id.unwrap())
        .await
        .unwrap();
    assert_eq!(record.amount, 5);
    assert_eq!(record.reason, "media-task-translation");
    assert_eq!(record.task_id, Some(task.id));

    // Only one translation per extraction
    let err = tasks.translate(task.id, "ja".to_string()).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(credits.balance(user_id).await.unwrap(), 5);
}

#[tokio::test]
async fn test_failed_translation_refunds_both_charges() {
    let db = setup_test_db().await;
    let (tasks, credits) = services(&db, TaskConfig::default());
    let user_id = Uuid::new_v4();
    fund(&credits, user_id, 15).await;

    let task = tasks.submit(user_id, youtube_subtitles()).await.unwrap();
    extract(&tasks, task.id).await;
    tasks.translate(task.id, "zh".to_string()).await.unwrap();
    assert_eq!(credits.balance(user_id).await.unwrap(), 0);

    let failure = tasks
        .fail(task.id, Some("translator timed out".to_string()))
        .await
        .unwrap();
    assert_eq!(failure.task.status, TaskStatus::Failed);
    assert_eq!(failure.refund, RefundOutcome::Refunded { amount: 10 });
    assert_eq!(
        failure.translation_refund,
        Some(RefundOutcome::Refunded { amount: 5 })
    );
    assert_eq!(credits.balance(user_id).await.unwrap(), 15);

    let again = tasks.fail(task.id, None).await.unwrap();
    assert_eq!(again.translation_refund, Some(RefundOutcome::AlreadyRefunded));
    assert_eq!(credits.balance(user_id).await.unwrap(), 15);
}

#[tokio::test]
async fn test_translate_requires_extracted_subtitle() {
    let db = setup_test_db().await;
    let (tasks, credits) = services(&db, TaskConfig::default());
    let user_id = Uuid::new_v4();
    fund(&credits, user_id, 20).await;

    let task = tasks.submit(user_id, youtube_subtitles()).await.unwrap();
    let err = tasks.translate(task.id, "zh".to_string()).await.unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
    assert_eq!(credits.balance(user_id).await.unwrap(), 10);

    // The worker cannot reopen an extracted task on its own
    extract(&tasks, task.id).await;
    let err = tasks
        .update_progress(
            task.id,
            TaskProgressRequest {
                status: Some(TaskStatus::Translating),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Conflict(_)));
}

#[tokio::test]
async fn test_translate_without_credits_keeps_task_extracted() {
    let db = setup_test_db().await;
    let (tasks, credits) = services(&db, TaskConfig::default());
    let user_id = Uuid::new_v4();
    fund(&credits, user_id, 12).await;

    let task = tasks.submit(user_id, youtube_subtitles()).await.unwrap();
    extract(&tasks, task.id).await;

    let err = tasks.translate(task.id, "zh".to_string()).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::InsufficientBalance {
            required: 5,
            available: 2
        }
    ));

    let task = tasks.find(task.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Extracted);
    assert_eq!(task.translation_consumption_id, None);
    assert_eq!(credits.balance(user_id).await.unwrap(), 2);
}

#[tokio::test]
async fn test_free_trial_translates_without_charge() {
    let db = setup_test_db().await;
    let config = TaskConfig {
        free_trial_count: 1,
        ..Default::default()
    };
    let (tasks, credits) = services(&db, config);
    let user_id = Uuid::new_v4();

    let trial = tasks.submit(user_id, youtube_subtitles()).await.unwrap();
    extract(&tasks, trial.id).await;

    let translating = tasks.translate(trial.id, "zh".to_string()).await.unwrap();
    assert_eq!(translating.status, TaskStatus::Translating);
    assert_eq!(translating.translation_consumption_id, None);
    assert_eq!(translating.cost_credits, 0);

    let failure = tasks.fail(trial.id, None).await.unwrap();
    assert_eq!(failure.refund, RefundOutcome::NotCharged);
    assert_eq!(failure.translation_refund, None);
}
