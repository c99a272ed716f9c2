//! Host scheduler: drives one connector and its task, publishes each batch
//! and checkpoints the cursor.

use async_trait::async_trait;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, trace, warn};

use crate::checkpoint::{Checkpoint, CheckpointManager};
use crate::kafka::KafkaProducer;
use crate::postgres::PgSession;
use crate::source::{
    Cursor, Record, RecordObserver, SourceConnector, SourceTask, TableSourceConnector,
    TableSourceTask,
};
use crate::{Config, Error, Result};

/// Downstream transport for polled records.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn publish(&self, records: &[Record]) -> Result<()>;
}

pub struct Poller {
    config: Config,
    observed: Arc<AtomicU64>,
}

impl Poller {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            observed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Records seen by the task since this poller was created.
    pub fn observed_records(&self) -> u64 {
        self.observed.load(Ordering::Relaxed)
    }

    /// Poll PostgreSQL into Kafka until Ctrl+C.
    pub async fn run(&self) -> Result<()> {
        info!("Poller starting");

        let producer = KafkaProducer::new(&self.config.kafka)?;
        let session = PgSession::connect(&self.config.postgres).await?;
        let mut connector = TableSourceConnector::new(session);

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
            info!("Shutdown requested");
        };

        self.run_with(&mut connector, &producer, shutdown).await
    }

    /// Start `connector`, poll its task into `sink` until `shutdown`
    /// resolves or a fatal error occurs, then stop the connector.
    pub async fn run_with<C, K, F>(&self, connector: &mut C, sink: &K, shutdown: F) -> Result<()>
    where
        C: SourceConnector,
        K: RecordSink,
        F: Future<Output = ()>,
    {
        connector.start(self.config.source.clone()).await?;
        let result = self.drive(connector, sink, shutdown).await;

        if let Err(e) = connector.stop().await {
            warn!("Failed to stop connector cleanly: {}", e);
        }
        result
    }

    async fn drive<C, K, F>(&self, connector: &mut C, sink: &K, shutdown: F) -> Result<()>
    where
        C: SourceConnector,
        K: RecordSink,
        F: Future<Output = ()>,
    {
        let task_config = connector
            .task_configs(self.config.source.max_tasks)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Config("connector produced no task configuration".to_string()))?;
        let table = task_config.table.clone();

        let observed = self.observed.clone();
        let observer: RecordObserver = Arc::new(move |key: &str| {
            observed.fetch_add(1, Ordering::Relaxed);
            trace!(key, "record-read");
        });

        let mut task = TableSourceTask::with_observer(observer);
        task.start(task_config)?;

        let checkpoints = self
            .config
            .poller
            .checkpoint_file
            .as_ref()
            .map(CheckpointManager::new);
        let mut published = 0_u64;
        // Only ever checkpoint the cursor that followed a delivered batch.
        let mut published_cursor: Option<Cursor> = None;

        if let Some(manager) = &checkpoints {
            if let Some(checkpoint) = manager.load().await? {
                if checkpoint.table == table {
                    published = checkpoint.record_count;
                    task.resume(checkpoint.cursor)?;
                } else {
                    warn!(
                        checkpoint_table = %checkpoint.table,
                        table = %table,
                        "Ignoring checkpoint written for a different table"
                    );
                }
            }
        }

        let poll_interval = Duration::from_millis(self.config.poller.poll_interval_ms);
        let checkpoint_interval = Duration::from_secs(self.config.poller.checkpoint_interval_secs);
        let mut last_checkpoint = Instant::now();
        let mut unsaved = false;

        tokio::pin!(shutdown);

        let outcome = loop {
            let polled = tokio::select! {
                _ = &mut shutdown => break Ok(()),
                polled = task.poll() => polled,
            };

            match polled {
                Ok(records) if records.is_empty() => {
                    tokio::select! {
                        _ = &mut shutdown => break Ok(()),
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }
                Ok(records) => {
                    if let Err(e) = sink.publish(&records).await {
                        error!(table = %table, "Failed to publish batch: {}", e);
                        break Err(e);
                    }
                    published += records.len() as u64;
                    published_cursor = task.cursor().cloned();
                    unsaved = true;

                    if last_checkpoint.elapsed() >= checkpoint_interval {
                        if let Err(e) = save_checkpoint(
                            checkpoints.as_ref(),
                            &table,
                            published_cursor.as_ref(),
                            published,
                        )
                        .await
                        {
                            break Err(e);
                        }
                        last_checkpoint = Instant::now();
                        unsaved = false;
                    }
                }
                Err(Error::QueryExecution { message }) => {
                    warn!(table = %table, error = %message, "Poll failed, retrying after {:?}", poll_interval);
                    tokio::select! {
                        _ = &mut shutdown => break Ok(()),
                        _ = tokio::time::sleep(poll_interval) => {}
                    }
                }
                Err(e) => {
                    error!(table = %table, "Poll failed: {}", e);
                    break Err(e);
                }
            }
        };

        task.stop();
        if unsaved {
            save_checkpoint(
                checkpoints.as_ref(),
                &table,
                published_cursor.as_ref(),
                published,
            )
            .await?;
        }

        let stats = task.stats();
        info!(
            table = %table,
            polls = stats.polls,
            empty_polls = stats.empty_polls,
            failed_polls = stats.failed_polls,
            records = stats.records,
            published,
            "Poller stopped"
        );
        outcome
    }
}

async fn save_checkpoint(
    manager: Option<&CheckpointManager>,
    table: &str,
    cursor: Option<&Cursor>,
    published: u64,
) -> Result<()> {
    if let (Some(manager), Some(cursor)) = (manager, cursor) {
        manager
            .save(&Checkpoint::new(table.to_string(), cursor.clone(), published))
            .await?;
    }
    Ok(())
}
