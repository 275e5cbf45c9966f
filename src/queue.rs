// src/queue.rs
//
// Async processing dispatcher over a durable RabbitMQ queue. Intake enqueues
// upload ids; the worker consumes, runs the counter path, and acks only
// after a terminal status write landed. Jobs that were never enqueued (crash
// between the row insert and the publish) or never acked are recovered by a
// periodic sweep over uploads stuck in `processing`, which together with the
// status-guarded writes gives at-least-once delivery with idempotent
// handling.

use std::time::Duration;

use futures_util::StreamExt;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::error::ApiError;
use crate::processing::{self, ProcessOutcome};
use crate::storage::Storage;

const QUEUE_NAME: &str = "uploads.wordcount";
const SWEEP_BATCH_SIZE: i64 = 50;

#[derive(Debug, Serialize, Deserialize)]
struct JobMessage {
    upload_id: i32,
}

#[derive(Clone)]
pub struct JobQueue {
    channel: Channel,
}

impl JobQueue {
    pub async fn connect(amqp_url: &str) -> Result<Self, lapin::Error> {
        let conn = Connection::connect(amqp_url, ConnectionProperties::default()).await?;
        let channel = conn.create_channel().await?;
        channel
            .queue_declare(
                QUEUE_NAME,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        Ok(Self { channel })
    }

    pub async fn enqueue(&self, upload_id: i32) -> Result<(), ApiError> {
        let payload = serde_json::to_vec(&JobMessage { upload_id })
            .map_err(|e| ApiError::Internal(e.to_string()))?;

        self.channel
            .basic_publish(
                "",
                QUEUE_NAME,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| ApiError::Internal(format!("queue publish: {e}")))?
            .await
            .map_err(|e| ApiError::Internal(format!("queue confirm: {e}")))?;

        Ok(())
    }
}

/// Spawn the consumer and the stuck-upload sweeper.
pub fn start_worker(queue: JobQueue, pool: PgPool, storage: Storage, sweep_interval_secs: u64) {
    let sweeper_queue = queue.clone();
    let sweeper_pool = pool.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_secs(sweep_interval_secs)).await;
            if let Err(e) =
                sweep_stuck_uploads(&sweeper_pool, &sweeper_queue, sweep_interval_secs as i64).await
            {
                log::error!("sweep error: {e}");
            }
        }
    });

    tokio::spawn(async move {
        if let Err(e) = consume_jobs(&queue.channel, &pool, &storage).await {
            log::error!("queue consume error: {e}");
        }
    });
}

/// Re-enqueue uploads that have sat in `processing` for longer than one
/// sweep interval. Duplicate deliveries are harmless: the handler skips rows
/// that already went terminal.
async fn sweep_stuck_uploads(
    pool: &PgPool,
    queue: &JobQueue,
    older_than_secs: i64,
) -> Result<(), ApiError> {
    let stuck = crate::db::list_stuck_uploads(pool, older_than_secs, SWEEP_BATCH_SIZE).await?;
    for upload_id in stuck {
        log::warn!("re-enqueueing stuck upload {upload_id}");
        queue.enqueue(upload_id).await?;
    }
    Ok(())
}

async fn consume_jobs(
    channel: &Channel,
    pool: &PgPool,
    storage: &Storage,
) -> Result<(), lapin::Error> {
    let mut consumer = channel
        .basic_consume(
            QUEUE_NAME,
            "wordcount-worker",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await?;

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(d) => d,
            Err(e) => {
                log::error!("delivery error: {e}");
                continue;
            }
        };

        let message: JobMessage = match serde_json::from_slice(&delivery.data) {
            Ok(m) => m,
            Err(e) => {
                // Poison message; drop it rather than loop on it.
                log::error!("malformed job message, dropping: {e}");
                let _ = delivery.ack(BasicAckOptions::default()).await;
                continue;
            }
        };

        match processing::process_upload(pool, storage, message.upload_id).await {
            Ok(outcome) => {
                if let ProcessOutcome::Completed { word_count } = outcome {
                    log::debug!(
                        "upload {} completed with {} words",
                        message.upload_id,
                        word_count
                    );
                }
                if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                    log::error!("ack failed for upload {}: {e}", message.upload_id);
                }
            }
            Err(e) => {
                // Terminal write did not land; leave the row to the sweeper
                // instead of hot-looping on redelivery.
                log::error!("job for upload {} failed: {e}", message.upload_id);
                let _ = delivery
                    .nack(BasicNackOptions {
                        requeue: false,
                        ..BasicNackOptions::default()
                    })
                    .await;
            }
        }
    }

    Ok(())
}
