//! `SeaORM` Entity

use super::sea_orm_active_enums::{GrantScene, LedgerStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "credit_batches")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    #[sea_orm(unique)]
    pub transaction_no: String,
    pub scene: GrantScene,
    pub credits: i32,
    pub remaining_credits: i32,
    pub status: LedgerStatus,
    pub description: Option<String>,
    pub metadata: Option<Json>,
    pub expires_at: Option<TimeDateTimeWithTimeZone>,
    pub revoked_reason: Option<String>,
    pub created_at: TimeDateTimeWithTimeZone,
    pub updated_at: TimeDateTimeWithTimeZone,
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
