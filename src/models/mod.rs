// Request/Response models
pub mod checkin;
pub mod common;
pub mod credit_batch_ext; // Extension methods for entity::credit_batches
pub mod credits;
pub mod reconcile;
pub mod tasks;
pub mod welcome;
