use entity::{
    media_tasks,
    sea_orm_active_enums::{OutputType, TaskPlatform, TaskStatus},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{common::SuccessResponse, credits::RefundOutcome};
use crate::config::PricingConfig;

/// Request to start a media task
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitTaskRequest {
    #[validate(length(min = 1, max = 2048))]
    pub url: String,

    #[serde(default = "default_output_type")]
    pub output_type: OutputType,

    #[validate(length(min = 2, max = 16))]
    pub target_lang: Option<String>,
}

fn default_output_type() -> OutputType {
    OutputType::Subtitle
}

/// Progress report from the media worker
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgressRequest {
    pub status: Option<TaskStatus>,

    #[validate(range(min = 0, max = 100))]
    pub progress: Option<i32>,

    #[validate(length(max = 500))]
    pub title: Option<String>,
    #[validate(length(max = 16))]
    pub source_lang: Option<String>,
    #[validate(length(max = 2048))]
    pub srt_url: Option<String>,
    #[validate(length(max = 2048))]
    pub translated_srt_url: Option<String>,
    #[validate(length(max = 2048))]
    pub result_video_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FailTaskRequest {
    #[validate(length(max = 2000))]
    pub error_message: Option<String>,
}

/// Send an extracted subtitle for paid translation
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TranslateTaskRequest {
    #[validate(length(min = 2, max = 16))]
    pub target_lang: String,
}

/// Which site a video URL belongs to
pub fn detect_platform(url: &str) -> Option<TaskPlatform> {
    let url = url.to_lowercase();
    if url.contains("youtube.com") || url.contains("youtu.be") {
        Some(TaskPlatform::Youtube)
    } else if url.contains("tiktok.com") {
        Some(TaskPlatform::Tiktok)
    } else {
        None
    }
}

/// Credits charged for a task
pub fn task_cost(
    pricing: &PricingConfig,
    platform: TaskPlatform,
    output_type: OutputType,
    target_lang: Option<&str>,
) -> i32 {
    match output_type {
        OutputType::Video if platform == TaskPlatform::Tiktok => pricing.video_download,
        OutputType::Video => pricing.subtitle_extraction,
        OutputType::Subtitle if target_lang.is_some() => {
            pricing.subtitle_extraction + pricing.translation_surcharge
        }
        OutputType::Subtitle => pricing.subtitle_extraction,
    }
}

/// Task lifecycle rules
pub trait TaskStatusExt {
    /// Occupies one of the user's concurrent slots
    fn is_active(&self) -> bool;

    fn is_terminal(&self) -> bool;

    fn can_transition_to(&self, next: TaskStatus) -> bool;
}

impl TaskStatusExt for TaskStatus {
    fn is_active(&self) -> bool {
        matches!(
            self,
            TaskStatus::Pending | TaskStatus::Extracting | TaskStatus::Translating
        )
    }

    fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Extracted | TaskStatus::Completed | TaskStatus::Failed
        )
    }

    fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (current, next) if *current == next => !current.is_terminal(),
            (Pending, Extracting) => true,
            (Extracting, Translating | Extracted | Completed) => true,
            (Extracted, Translating) => true,
            (Translating, Completed) => true,
            (current, Failed) => !current.is_terminal(),
            _ => false,
        }
    }
}

#[derive(Debug, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub id: Uuid,
    pub platform: TaskPlatform,
    pub video_url: String,
    pub output_type: OutputType,
    pub target_lang: Option<String>,
    pub status: TaskStatus,
    pub progress: i32,
    pub cost_credits: i32,
    pub is_free_trial: bool,
    pub consumption_id: Option<Uuid>,
    pub translation_consumption_id: Option<Uuid>,
    pub title: Option<String>,
    pub source_lang: Option<String>,
    pub srt_url: Option<String>,
    pub translated_srt_url: Option<String>,
    pub result_video_url: Option<String>,
    pub error_message: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: time::OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: time::OffsetDateTime,
}

impl From<media_tasks::Model> for TaskView {
    fn from(task: media_tasks::Model) -> Self {
        Self {
            id: task.id,
            platform: task.platform,
            video_url: task.video_url,
            output_type: task.output_type,
            target_lang: task.target_lang,
            status: task.status,
            progress: task.progress,
            cost_credits: task.cost_credits,
            is_free_trial: task.is_free_trial,
            consumption_id: task.consumption_id,
            translation_consumption_id: task.translation_consumption_id,
            title: task.title,
            source_lang: task.source_lang,
            srt_url: task.srt_url,
            translated_srt_url: task.translated_srt_url,
            result_video_url: task.result_video_url,
            error_message: task.error_message,
            created_at: task.created_at,
            updated_at: task.updated_at,
        }
    }
}

/// A failed task with the refunds of its submission and translation debits
#[derive(Debug)]
pub struct TaskFailure {
    pub task: media_tasks::Model,
    pub refund: RefundOutcome,
    /// `None` when the task was never sent for translation
    pub translation_refund: Option<RefundOutcome>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailTaskData {
    pub task: TaskView,
    pub refund: RefundOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation_refund: Option<RefundOutcome>,
}

impl From<TaskFailure> for FailTaskData {
    fn from(failure: TaskFailure) -> Self {
        Self {
            task: TaskView::from(failure.task),
            refund: failure.refund,
            translation_refund: failure.translation_refund,
        }
    }
}

pub type TaskResponse = SuccessResponse<TaskView>;
pub type TaskListResponse = SuccessResponse<Vec<TaskView>>;
pub type FailTaskResponse = SuccessResponse<FailTaskData>;
