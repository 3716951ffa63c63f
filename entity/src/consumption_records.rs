//! `SeaORM` Entity

use super::sea_orm_active_enums::LedgerStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "consumption_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    #[sea_orm(unique)]
    pub transaction_no: String,
    pub amount: i32,
    pub reason: String,
    pub description: Option<String>,
    pub task_id: Option<Uuid>,
    pub status: LedgerStatus,
    pub created_at: TimeDateTimeWithTimeZone,
    pub refunded_at: Option<TimeDateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::consumption_line_items::Entity")]
    ConsumptionLineItems,
}

impl Related<super::consumption_line_items::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConsumptionLineItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
