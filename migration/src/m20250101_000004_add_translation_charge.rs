use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Debit taken when an extracted subtitle is sent for translation.
        // SQLite cannot add a foreign key through ALTER TABLE, so the link is left unconstrained.
        manager
            .alter_table(
                Table::alter()
                    .table(MediaTasks::Table)
                    .add_column(uuid_null(MediaTasks::TranslationConsumptionId))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_media_tasks_translation_consumption_id")
                    .table(MediaTasks::Table)
                    .col(MediaTasks::TranslationConsumptionId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_media_tasks_translation_consumption_id")
                    .table(MediaTasks::Table)
                    .to_owned(),
            )
            .await?;

        manager
            .alter_table(
                Table::alter()
                    .table(MediaTasks::Table)
                    .drop_column(MediaTasks::TranslationConsumptionId)
                    .to_owned(),
            )
            .await
    }
}

#[derive(DeriveIden)]
enum MediaTasks {
    Table,
    TranslationConsumptionId,
}
