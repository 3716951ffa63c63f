use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(DailyCheckins::Table)
                    .if_not_exists()
                    .col(pk_uuid(DailyCheckins::Id))
                    .col(uuid(DailyCheckins::UserId).not_null())
                    .col(date(DailyCheckins::CheckinDate).not_null())
                    .col(integer(DailyCheckins::RewardCredits).not_null())
                    .col(
                        timestamp_with_time_zone(DailyCheckins::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // One check-in per user per UTC day
        manager
            .create_index(
                Index::create()
                    .name("idx_daily_checkins_user_date")
                    .table(DailyCheckins::Table)
                    .col(DailyCheckins::UserId)
                    .col(DailyCheckins::CheckinDate)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DailyCheckins::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum DailyCheckins {
    Table,
    Id,
    UserId,
    CheckinDate,
    RewardCredits,
    CreatedAt,
}
