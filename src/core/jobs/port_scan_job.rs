// src/core/jobs/port_scan_job.rs

use async_trait::async_trait;
use tracing::info;

use super::{JobContext, JobHandler};
use crate::core::error::JobError;
use crate::core::models::{JobKind, Target, UpdateEvent};

/// Runs a fast (`-F`, common ports) nmap scan and sends the whole report at once.
pub struct PortScanJob;

#[async_trait]
impl JobHandler for PortScanJob {
    fn kind(&self) -> JobKind {
        JobKind::PortScan
    }

    async fn handle(&self, target: &Target, ctx: &JobContext<'_>) -> Result<(), JobError> {
        let settings = ctx.settings;
        let args = vec!["-F".to_string(), target.as_str().to_string()];
        info!(target = %target, timeout = ?settings.scan_timeout, "Starting port scan.");

        let report = ctx
            .runner
            .run_bounded(&settings.nmap_bin, &args, settings.scan_timeout)
            .await?;
        info!(target = %target, bytes = report.len(), "Port scan finished.");
        ctx.emitter.send(UpdateEvent::data(JobKind::PortScan, report)).await;
        Ok(())
    }
}
