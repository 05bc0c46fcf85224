// src/core/jobs/subdomain_job.rs

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use super::{JobContext, JobHandler, next_line};
use crate::core::error::JobError;
use crate::core::models::{JobKind, Target, UpdateEvent};

/// Organization name recorded with every discovery. Nothing populates it yet.
const ORG_NAME: &str = "";

/// Streams `subfinder` results, persisting each discovered name before
/// forwarding it to the client.
pub struct SubdomainJob;

#[async_trait]
impl JobHandler for SubdomainJob {
    fn kind(&self) -> JobKind {
        JobKind::SubdomainEnum
    }

    async fn handle(&self, target: &Target, ctx: &JobContext<'_>) -> Result<(), JobError> {
        let domain = target.as_str();
        let args = vec!["-d".to_string(), domain.to_string(), "-silent".to_string()];
        info!(domain, "Starting subdomain enumeration.");

        let mut lines = ctx.runner.run_streaming(&ctx.settings.subfinder_bin, &args);
        let mut found = 0usize;
        while let Some(line) = next_line(&mut lines, ctx.emitter).await {
            let subdomain = line?;
            if subdomain.is_empty() {
                continue;
            }

            // Persistence is best effort: a failed insert must not cut the stream short.
            if let Err(e) = ctx.store.append_subdomain(ORG_NAME, domain, &subdomain, Utc::now()).await {
                warn!(%subdomain, error = %e, "Could not persist subdomain.");
            }
            ctx.emitter.send(UpdateEvent::subdomain(JobKind::SubdomainEnum, subdomain)).await;
            found += 1;
        }

        if found == 0 {
            ctx.emitter
                .send(UpdateEvent::data(JobKind::SubdomainEnum, format!("No subdomains found for {domain}")))
                .await;
        }
        info!(domain, found, "Subdomain enumeration finished.");
        Ok(())
    }
}
