// src/core/jobs/whois_job.rs

use async_trait::async_trait;
use tracing::info;

use super::{JobContext, JobHandler};
use crate::core::error::JobError;
use crate::core::models::{JobKind, Target, UpdateEvent};

/// Looks up registration data and sends it as one JSON document.
pub struct WhoisJob;

#[async_trait]
impl JobHandler for WhoisJob {
    fn kind(&self) -> JobKind {
        JobKind::Whois
    }

    async fn handle(&self, target: &Target, ctx: &JobContext<'_>) -> Result<(), JobError> {
        info!(domain = %target, "Starting WHOIS job.");
        let record = ctx.client.fetch_whois(target.as_str()).await?;
        let json = serde_json::to_string(&record)
            .map_err(|e| JobError::ProtocolFailure(format!("cannot encode record: {e}")))?;
        ctx.emitter.send(UpdateEvent::data(JobKind::Whois, json)).await;
        Ok(())
    }
}
