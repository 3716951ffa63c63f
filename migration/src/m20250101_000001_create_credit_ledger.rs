use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Grants: one row per purchase / award / check-in
        manager
            .create_table(
                Table::create()
                    .table(CreditBatches::Table)
                    .if_not_exists()
                    .col(pk_uuid(CreditBatches::Id))
                    .col(uuid(CreditBatches::UserId).not_null())
                    .col(
                        string(CreditBatches::TransactionNo)
                            .unique_key()
                            .not_null(),
                    )
                    .col(string_len(CreditBatches::Scene, 16).not_null())
                    .col(integer(CreditBatches::Credits).not_null())
                    .col(integer(CreditBatches::RemainingCredits).not_null())
                    .col(
                        string_len(CreditBatches::Status, 16)
                            .default("active")
                            .not_null(),
                    )
                    .col(string_null(CreditBatches::Description))
                    .col(json_null(CreditBatches::Metadata))
                    .col(timestamp_with_time_zone_null(CreditBatches::ExpiresAt))
                    .col(string_null(CreditBatches::RevokedReason))
                    .col(
                        timestamp_with_time_zone(CreditBatches::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(CreditBatches::UpdatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .check(Expr::col(CreditBatches::RemainingCredits).gte(0))
                    .to_owned(),
            )
            .await?;

        // Spendable batch lookup during consumption
        manager
            .create_index(
                Index::create()
                    .name("idx_credit_batches_user_status")
                    .table(CreditBatches::Table)
                    .col(CreditBatches::UserId)
                    .col(CreditBatches::Status)
                    .to_owned(),
            )
            .await?;

        // Debits
        manager
            .create_table(
                Table::create()
                    .table(ConsumptionRecords::Table)
                    .if_not_exists()
                    .col(pk_uuid(ConsumptionRecords::Id))
                    .col(uuid(ConsumptionRecords::UserId).not_null())
                    .col(
                        string(ConsumptionRecords::TransactionNo)
                            .unique_key()
                            .not_null(),
                    )
                    .col(integer(ConsumptionRecords::Amount).not_null())
                    .col(string(ConsumptionRecords::Reason).not_null())
                    .col(string_null(ConsumptionRecords::Description))
                    .col(uuid_null(ConsumptionRecords::TaskId))
                    .col(
                        string_len(ConsumptionRecords::Status, 16)
                            .default("active")
                            .not_null(),
                    )
                    .col(
                        timestamp_with_time_zone(ConsumptionRecords::CreatedAt)
                            .default(Expr::current_timestamp())
                            .not_null(),
                    )
                    .col(timestamp_with_time_zone_null(
                        ConsumptionRecords::RefundedAt,
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_consumption_records_user_status")
                    .table(ConsumptionRecords::Table)
                    .col(ConsumptionRecords::UserId)
                    .col(ConsumptionRecords::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_consumption_records_task_id")
                    .table(ConsumptionRecords::Table)
                    .col(ConsumptionRecords::TaskId)
                    .to_owned(),
            )
            .await?;

        // Which batches paid for which debit
        manager
            .create_table(
                Table::create()
                    .table(ConsumptionLineItems::Table)
                    .if_not_exists()
                    .col(pk_uuid(ConsumptionLineItems::Id))
                    .col(uuid(ConsumptionLineItems::ConsumptionId).not_null())
                    .col(uuid(ConsumptionLineItems::BatchId).not_null())
                    .col(integer(ConsumptionLineItems::Amount).not_null())
                    .check(Expr::col(ConsumptionLineItems::Amount).gt(0))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_consumption_line_items_consumption_id")
                            .from(
                                ConsumptionLineItems::Table,
                                ConsumptionLineItems::ConsumptionId,
                            )
                            .to(ConsumptionRecords::Table, ConsumptionRecords::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_consumption_line_items_batch_id")
                            .from(ConsumptionLineItems::Table, ConsumptionLineItems::BatchId)
                            .to(CreditBatches::Table, CreditBatches::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_consumption_line_items_consumption_id")
                    .table(ConsumptionLineItems::Table)
                    .col(ConsumptionLineItems::ConsumptionId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ConsumptionLineItems::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ConsumptionRecords::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CreditBatches::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum CreditBatches {
    Table,
    Id,
    UserId,
    TransactionNo,
    Scene,
    Credits,
    RemainingCredits,
    Status,
    Description,
    Metadata,
    ExpiresAt,
    RevokedReason,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub(crate) enum ConsumptionRecords {
    Table,
    Id,
    UserId,
    TransactionNo,
    Amount,
    Reason,
    Description,
    TaskId,
    Status,
    CreatedAt,
    RefundedAt,
}

#[derive(DeriveIden)]
enum ConsumptionLineItems {
    Table,
    Id,
    ConsumptionId,
    BatchId,
    Amount,
}
