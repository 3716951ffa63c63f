use sea_orm_migration::{prelude::*, schema::*};

use super::m20250101_000001_create_credit_ledger::ConsumptionRecords;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(MediaTasks::Table)
                    .if_not_exists()
                    .col(pk_uuid(MediaTasks::Id))
                    .col(uuid(MediaTasks::UserId).not_null())
                    // Request
                    .col(string_len(MediaTasks::Platform, 16).not_null())
                    .col(text(MediaTasks::VideoUrl).not_null())
                    .col(string_len(MediaTasks::OutputType, 16).not_null())
                    .col(string_null(MediaTasks::TargetLang))
                    // Lifecycle
                    .col(
                        string_len(MediaTasks::Status, 16)
                            .default("pending")
                            .not_null(),
                    )
                    .col(integer(MediaTasks::Progress).default(0).not_null())
                    // Billing
                    .col(integer(MediaTasks::CostCredits).not_null())
                    .col(boolean(MediaTasks::IsFreeTrial).default(false).not_null())
                    .col(uuid_null(MediaTasks::ConsumptionId))
                    // Results
                    .col(string_null(MediaTasks::Title))
                    .col(string_null(MediaTasks::SourceLang))
                    .col(text_null(MediaTasks::SrtUrl))
                    .col(text_null(MediaTasks::TranslatedSrtUrl))
                    .col(text_null(MediaTasks::ResultVideoUrl))
                    .col(text_null(MediaTasks::ErrorMessage))
                    // Timestamps
                    .col(
                        timestamp_with_time_zone(MediaTasks::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(MediaTasks::UpdatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_media_tasks_consumption_id")
                            .from(MediaTasks::Table, MediaTasks::ConsumptionId)
                            .to(ConsumptionRecords::Table, ConsumptionRecords::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_media_tasks_user_status")
                    .table(MediaTasks::Table)
                    .col(MediaTasks::UserId)
                    .col(MediaTasks::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_media_tasks_user_created")
                    .table(MediaTasks::Table)
                    .col(MediaTasks::UserId)
                    .col(MediaTasks::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MediaTasks::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum MediaTasks {
    Table,
    Id,
    UserId,

    // Request
    Platform,
    VideoUrl,
    OutputType,
    TargetLang,

    // Lifecycle
    Status,
    Progress,

    // Billing
    CostCredits,
    IsFreeTrial,
    ConsumptionId,

    // Results
    Title,
    SourceLang,
    SrtUrl,
    TranslatedSrtUrl,
    ResultVideoUrl,
    ErrorMessage,

    // Timestamps
    CreatedAt,
    UpdatedAt,
}
