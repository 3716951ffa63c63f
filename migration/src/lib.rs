pub use sea_orm_migration::prelude::*;

mod m20250101_000001_create_credit_ledger;
mod m20250101_000002_create_media_tasks;
mod m20250101_000003_create_daily_checkins;
mod m20250101_000004_add_translation_charge;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_credit_ledger::Migration),
            Box::new(m20250101_000002_create_media_tasks::Migration),
            Box::new(m20250101_000003_create_daily_checkins::Migration),
            Box::new(m20250101_000004_add_translation_charge::Migration),
        ]
    }
}
