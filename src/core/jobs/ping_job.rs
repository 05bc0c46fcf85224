// src/core/jobs/ping_job.rs

use async_trait::async_trait;
use tracing::{debug, info};

use super::{JobContext, JobHandler, next_line};
use crate::core::error::JobError;
use crate::core::models::{JobKind, Target, UpdateEvent};

/// Streams ICMP echo output, one event per line, while `ping` is running.
pub struct PingJob;

#[async_trait]
impl JobHandler for PingJob {
    fn kind(&self) -> JobKind {
        JobKind::Ping
    }

    async fn handle(&self, target: &Target, ctx: &JobContext<'_>) -> Result<(), JobError> {
        let settings = ctx.settings;
        let args = vec![
            "-c".to_string(),
            settings.ping_count.to_string(),
            target.as_str().to_string(),
        ];
        info!(target = %target, count = settings.ping_count, "Starting ping.");

        let mut lines = ctx.runner.run_streaming(&settings.ping_bin, &args);
        let mut forwarded = 0usize;
        while let Some(line) = next_line(&mut lines, ctx.emitter).await {
            let line = line?;
            debug!(%line, "Ping output.");
            ctx.emitter.send(UpdateEvent::data(JobKind::Ping, line)).await;
            forwarded += 1;
        }

        if forwarded == 0 {
            ctx.emitter
                .send(UpdateEvent::data(JobKind::Ping, format!("No output from {}", settings.ping_bin)))
                .await;
        }
        info!(target = %target, lines = forwarded, "Ping finished.");
        Ok(())
    }
}
