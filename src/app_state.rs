use crate::{
    config::Config,
    services::{
        CheckinService, CreditsService, ReconcileService, TaskService, WelcomeBonusService,
    },
};
use migration::{Migrator, MigratorTrait};
use sea_orm::{ConnectOptions, DatabaseConnection};
use std::{sync::Arc, time::Duration};

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub credits_service: Arc<CreditsService>,
    pub task_service: Arc<TaskService>,
    pub checkin_service: Arc<CheckinService>,
    pub reconcile_service: Arc<ReconcileService>,
    pub welcome_bonus_service: Arc<WelcomeBonusService>,
    pub config: Arc<Config>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Self, anyhow::Error> {
        // Connect to database
        let mut options = ConnectOptions::new(config.database.url.clone());
        options
            .max_connections(config.database.max_connections)
            .connect_timeout(Duration::from_secs(10))
            .sqlx_logging(false);
        let db = sea_orm::Database::connect(options).await?;

        if config.database.run_migrations {
            Migrator::up(&db, None).await?;
            tracing::info!("Applied pending migrations");
        }

        Ok(Self::with_connection(db, config))
    }

    /// Build services on top of an existing connection
    pub fn with_connection(db: DatabaseConnection, config: Config) -> Self {
        let credits_service = Arc::new(CreditsService::new(db.clone()));
        let task_service = Arc::new(TaskService::new(
            db.clone(),
            &config.pricing,
            &config.tasks,
        ));
        let checkin_service = Arc::new(CheckinService::new(db.clone(), &config.checkin));
        let reconcile_service = Arc::new(ReconcileService::new(db.clone()));
        let welcome_bonus_service =
            Arc::new(WelcomeBonusService::new(db.clone(), &config.welcome));

        Self {
            db,
            credits_service,
            task_service,
            checkin_service,
            reconcile_service,
            welcome_bonus_service,
            config: Arc::new(config),
        }
    }
}
