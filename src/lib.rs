pub mod api;
pub mod config;
pub mod counter;
pub mod db;
pub mod docs;
pub mod error;
pub mod gateway;
pub mod models;
pub mod payment;
pub mod processing;
pub mod queue;
pub mod storage;

use sqlx::PgPool;

use crate::gateway::AamarPayClient;
use crate::queue::JobQueue;
use crate::storage::Storage;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub storage: Storage,
    pub gateway: AamarPayClient,
    /// None when no broker is configured; intake then leaves dispatch to the
    /// stuck-upload sweeper.
    pub queue: Option<JobQueue>,
    pub jwt_secret: String,
}
