//! `SeaORM` Entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "consumption_line_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub consumption_id: Uuid,
    pub batch_id: Uuid,
    pub amount: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::consumption_records::Entity",
        from = "Column::ConsumptionId",
        to = "super::consumption_records::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ConsumptionRecords,
    #[sea_orm(
        belongs_to = "super::credit_batches::Entity",
        from = "Column::BatchId",
        to = "super::credit_batches::Column::Id",
        on_update = "NoAction",
        on_delete = "Restrict"
    )]
    CreditBatches,
}

impl Related<super::consumption_records::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsumptionRecords.def()
    }
}

impl Related<super::credit_batches::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CreditBatches.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
