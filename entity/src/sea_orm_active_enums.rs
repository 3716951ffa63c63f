//! `SeaORM` Entity enums. Stored as short strings so the schema stays portable.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle shared by credit batches and consumption records.
/// `Active` to `Deleted` is one-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum LedgerStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "deleted")]
    Deleted,
}

/// Why a batch of credits was granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum GrantScene {
    #[sea_orm(string_value = "purchase")]
    Purchase,
    #[sea_orm(string_value = "subscription")]
    Subscription,
    #[sea_orm(string_value = "grant")]
    Grant,
    #[sea_orm(string_value = "award")]
    Award,
    #[sea_orm(string_value = "checkin")]
    Checkin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "extracting")]
    Extracting,
    #[sea_orm(string_value = "translating")]
    Translating,
    #[sea_orm(string_value = "extracted")]
    Extracted,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum TaskPlatform {
    #[sea_orm(string_value = "youtube")]
    Youtube,
    #[sea_orm(string_value = "tiktok")]
    Tiktok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    #[sea_orm(string_value = "subtitle")]
    Subtitle,
    #[sea_orm(string_value = "video")]
    Video,
}
