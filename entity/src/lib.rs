//! `SeaORM` Entity, generated against the creditline schema and kept in sync by hand.

pub mod prelude;

pub mod consumption_line_items;
pub mod consumption_records;
pub mod credit_batches;
pub mod daily_checkins;
pub mod media_tasks;
pub mod sea_orm_active_enums;
