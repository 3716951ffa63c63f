//! `SeaORM` Entity

use super::sea_orm_active_enums::{OutputType, TaskPlatform, TaskStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "media_tasks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
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
    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,
    pub created_at: TimeDateTimeWithTimeZone,
    pub updated_at: TimeDateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::consumption_records::Entity",
        from = "Column::ConsumptionId",
        to = "super::consumption_records::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    ConsumptionRecords,
}

impl Related<super::consumption_records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsumptionRecords.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
