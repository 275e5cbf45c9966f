pub mod auth;
pub mod payments;
pub mod uploads;
pub mod webhooks;
