//! API handlers.

pub mod bills;
pub mod connections;
pub mod health;
pub mod notifications;
pub mod payments;
pub mod reports;
pub mod usage;
pub mod webhooks;
