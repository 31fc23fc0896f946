//! Fire-and-forget job emission to the forwarding and DNS provisioning workers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::error::{AppError, Result};

/// DNS mail-identity action requested of the provisioning worker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DnsAction {
    Create,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsIdentityJob {
    pub action: DnsAction,
    /// `<label>.<domain>`
    pub domain: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Job {
    /// Original webhook payload with `destination` injected
    Forward(Value),
    DnsIdentity(DnsIdentityJob),
}

impl Job {
    pub fn create_identity(domain: impl Into<String>) -> Self {
        Job::DnsIdentity(DnsIdentityJob {
            action: DnsAction::Create,
            domain: domain.into(),
        })
    }

    pub fn delete_identity(domain: impl Into<String>) -> Self {
        Job::DnsIdentity(DnsIdentityJob {
            action: DnsAction::Delete,
            domain: domain.into(),
        })
    }

    /// Message body as the worker receives it
    pub fn payload(&self) -> Value {
        match self {
            Job::Forward(payload) => payload.clone(),
            Job::DnsIdentity(job) => serde_json::json!({
                "action": job.action,
                "domain": job.domain,
            }),
        }
    }
}

/// Enqueue a job without waiting for it to be processed
#[async_trait]
pub trait JobSink: Send + Sync {
    async fn send(&self, job: Job) -> Result<()>;
}

/// Writes one `job_outbox` row per job, tagged with the sink's queue
pub struct PgJobSink {
    pool: PgPool,
    queue: &'static str,
}

impl PgJobSink {
    pub fn new(pool: PgPool, queue: &'static str) -> Self {
        Self { pool, queue }
    }
}

#[async_trait]
impl JobSink for PgJobSink {
    async fn send(&self, job: Job) -> Result<()> {
        let payload = job.payload().to_string();

        sqlx::query("INSERT INTO job_outbox (queue, payload) VALUES ($1, $2::jsonb)")
            .bind(self.queue)
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::ExternalDependency(format!("{} outbox: {}", self.queue, e)))?;

        tracing::info!("Queued job on {}", self.queue);
        Ok(())
    }
}

/// Hands jobs to an in-process consumer
#[derive(Clone)]
pub struct ChannelJobSink {
    tx: mpsc::UnboundedSender<Job>,
}

impl ChannelJobSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Job>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl JobSink for ChannelJobSink {
    async fn send(&self, job: Job) -> Result<()> {
        self.tx
            .send(job)
            .map_err(|_| AppError::ExternalDependency("job channel closed".to_string()))
    }
}

/// Drops every job; used while DNS provisioning is switched off
pub struct NoopJobSink;

#[async_trait]
impl JobSink for NoopJobSink {
    async fn send(&self, job: Job) -> Result<()> {
        tracing::debug!("Discarding job: {}", job.payload());
        Ok(())
    }
}

/// The two queues the relay subsystem writes to
#[derive(Clone)]
pub struct JobSinks {
    pub forwarding: Arc<dyn JobSink>,
    pub provisioning: Arc<dyn JobSink>,
}
