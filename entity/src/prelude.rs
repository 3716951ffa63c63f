//! `SeaORM` Entity prelude

pub use super::consumption_line_items::Entity as ConsumptionLineItems;
pub use super::consumption_records::Entity as ConsumptionRecords;
pub use super::credit_batches::Entity as CreditBatches;
pub use super::daily_checkins::Entity as DailyCheckins;
pub use super::media_tasks::Entity as MediaTasks;
