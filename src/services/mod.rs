// Service modules
pub mod checkin_service;
pub mod credits_service;
pub mod reconcile_service;
pub mod task_service;
pub mod welcome_bonus_service;

pub use checkin_service::CheckinService;
pub use credits_service::{CreditsService, GrantCredits};
pub use reconcile_service::ReconcileService;
pub use task_service::TaskService;
pub use welcome_bonus_service::WelcomeBonusService;
